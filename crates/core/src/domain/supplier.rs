use serde::{Deserialize, Serialize};

pub type SupplierId = i64;

pub const DEFAULT_LEAD_TIME_DAYS: i64 = 14;
pub const MAX_ORDERS_PER_YEAR: i64 = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    #[serde(default)]
    pub lead_time_days: Option<i64>,
    #[serde(default)]
    pub orders_per_year: Option<i64>,
    /// Global closure presets this supplier observes.
    #[serde(default)]
    pub preset_ids: Vec<i64>,
    /// Closures configured for this supplier only.
    #[serde(default)]
    pub closed_periods: Vec<ClosedPeriod>,
}

impl Supplier {
    /// Stand-in for products without a supplier: global defaults, no closures.
    pub fn unassigned() -> Self {
        Self {
            id: 0,
            name: "unassigned".to_string(),
            lead_time_days: None,
            orders_per_year: None,
            preset_ids: Vec::new(),
            closed_periods: Vec::new(),
        }
    }

    /// Configured lead time, or `default` when unset or below one day.
    pub fn lead_time_or(&self, default: i64) -> i64 {
        self.lead_time_days
            .filter(|d| *d >= 1)
            .unwrap_or_else(|| if default >= 1 { default } else { DEFAULT_LEAD_TIME_DAYS })
    }

    pub fn orders_per_year_or(&self, default: i64) -> i64 {
        self.orders_per_year
            .filter(|n| (1..=MAX_ORDERS_PER_YEAR).contains(n))
            .unwrap_or_else(|| default.clamp(1, MAX_ORDERS_PER_YEAR))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedPeriodKind {
    Preset,
    Custom,
}

/// A recurring yearly closure, expressed as day/month pairs without a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedPeriod {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: ClosedPeriodKind,
    pub start_day: u32,
    pub start_month: u32,
    pub end_day: u32,
    pub end_month: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplier() -> Supplier {
        Supplier {
            id: 1,
            name: "Roastery".to_string(),
            lead_time_days: Some(0),
            orders_per_year: Some(24),
            preset_ids: vec![],
            closed_periods: vec![],
        }
    }

    #[test]
    fn invalid_lead_time_uses_default() {
        let s = supplier();
        assert_eq!(s.lead_time_or(10), 10);
        assert_eq!(s.lead_time_or(0), DEFAULT_LEAD_TIME_DAYS);

        let s = Supplier {
            lead_time_days: Some(21),
            ..s
        };
        assert_eq!(s.lead_time_or(10), 21);
    }

    #[test]
    fn orders_per_year_override_must_be_in_range() {
        let s = supplier();
        assert_eq!(s.orders_per_year_or(4), 4);
        assert_eq!(s.orders_per_year_or(50), 12);

        let s = Supplier {
            orders_per_year: Some(6),
            ..s
        };
        assert_eq!(s.orders_per_year_or(4), 6);
    }
}
