use crate::directory::SalesLedger;
use crate::domain::product::Product;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const STD_DEV_WINDOW_DAYS: i64 = 90;
pub const MIN_STD_DEV_HISTORY_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ServiceLevel {
    #[serde(rename = "90")]
    P90,
    #[default]
    #[serde(rename = "95")]
    P95,
    #[serde(rename = "99")]
    P99,
}

impl ServiceLevel {
    /// Unrecognized levels fall back to 95%.
    pub fn from_percent(percent: u32) -> Self {
        match percent {
            90 => Self::P90,
            99 => Self::P99,
            _ => Self::P95,
        }
    }

    pub fn percent(&self) -> u32 {
        match self {
            Self::P90 => 90,
            Self::P95 => 95,
            Self::P99 => 99,
        }
    }

    pub fn z_score(&self) -> f64 {
        match self {
            Self::P90 => 1.28,
            Self::P95 => 1.65,
            Self::P99 => 2.33,
        }
    }
}

/// Population standard deviation of daily sales, zero-filled, over the history that starts at
/// the first sale inside the window (at least 7 and at most `window_days` days, ending `as_of`).
pub fn demand_std_dev(daily: &BTreeMap<NaiveDate, f64>, as_of: NaiveDate, window_days: i64) -> f64 {
    let window_days = window_days.max(MIN_STD_DEV_HISTORY_DAYS);
    let since = as_of - Duration::days(window_days - 1);
    let Some(first_sale) = daily
        .iter()
        .find(|(day, qty)| **day >= since && **day <= as_of && **qty > 0.0)
        .map(|(day, _)| *day)
    else {
        return 0.0;
    };

    let history_days =
        ((as_of - first_sale).num_days() + 1).clamp(MIN_STD_DEV_HISTORY_DAYS, window_days);
    let start = as_of - Duration::days(history_days - 1);

    let series: Vec<f64> = (0..history_days)
        .map(|offset| {
            let day = start + Duration::days(offset);
            daily.get(&day).copied().unwrap_or(0.0)
        })
        .collect();

    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let variance = series.iter().map(|q| (q - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// `ceil(z × σ × √max(1, lead_time))`.
pub fn safety_stock(std_dev: f64, lead_time: i64, level: ServiceLevel) -> i64 {
    if !std_dev.is_finite() || std_dev <= 0.0 {
        return 0;
    }
    let lead = lead_time.max(1) as f64;
    (level.z_score() * std_dev * lead.sqrt()).ceil().max(0.0) as i64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyStock {
    pub std_dev: f64,
    pub z_score: f64,
    pub quantity: i64,
}

#[derive(Clone)]
pub struct SafetyStockCalculator {
    ledger: Arc<dyn SalesLedger>,
}

impl SafetyStockCalculator {
    pub fn new(ledger: Arc<dyn SalesLedger>) -> Self {
        Self { ledger }
    }

    pub async fn calculate(
        &self,
        product: &Product,
        lead_time: i64,
        level: ServiceLevel,
        as_of: NaiveDate,
    ) -> anyhow::Result<SafetyStock> {
        let since = as_of - Duration::days(STD_DEV_WINDOW_DAYS - 1);
        let daily = self.ledger.daily_quantity_series(product.id, since).await?;
        let std_dev = demand_std_dev(&daily, as_of, STD_DEV_WINDOW_DAYS);

        Ok(SafetyStock {
            std_dev,
            z_score: level.z_score(),
            quantity: safety_stock(std_dev, lead_time, level),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn flat_demand_has_no_variability() {
        let as_of = d(2026, 10, 19);
        let daily: BTreeMap<_, _> = (0..120).map(|i| (as_of - Duration::days(i), 3.0)).collect();
        assert_eq!(demand_std_dev(&daily, as_of, STD_DEV_WINDOW_DAYS), 0.0);
    }

    #[test]
    fn short_history_is_padded_to_a_week() {
        let as_of = d(2026, 10, 19);
        let mut daily = BTreeMap::new();
        daily.insert(as_of, 7.0);
        // series [0, 0, 0, 0, 0, 0, 7]: mean 1, variance (6 * 1 + 36) / 7 = 6
        let sd = demand_std_dev(&daily, as_of, STD_DEV_WINDOW_DAYS);
        assert!((sd - 6.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn sales_before_the_window_are_ignored() {
        let as_of = d(2026, 10, 19);
        let mut daily = BTreeMap::new();
        daily.insert(d(2026, 1, 1), 50.0);
        assert_eq!(demand_std_dev(&daily, as_of, STD_DEV_WINDOW_DAYS), 0.0);
    }

    #[test]
    fn unknown_service_level_defaults_to_95() {
        assert_eq!(ServiceLevel::from_percent(80), ServiceLevel::P95);
        assert_eq!(ServiceLevel::from_percent(99).z_score(), 2.33);
    }

    #[test]
    fn safety_stock_rounds_up() {
        // 1.65 * 2 * sqrt(16) = 13.2
        assert_eq!(safety_stock(2.0, 16, ServiceLevel::P95), 14);
        assert_eq!(safety_stock(2.0, 0, ServiceLevel::P90), 3);
        assert_eq!(safety_stock(0.0, 30, ServiceLevel::P99), 0);
    }

    #[test]
    fn safety_stock_is_monotonic() {
        let levels = [ServiceLevel::P90, ServiceLevel::P95, ServiceLevel::P99];
        for sd in [0.3, 1.0, 4.7] {
            let mut previous = 0;
            for lead in 1..60 {
                let current = safety_stock(sd, lead, ServiceLevel::P95);
                assert!(current >= previous);
                previous = current;
            }
            for lead in [1, 14, 45] {
                let values: Vec<i64> = levels.iter().map(|l| safety_stock(sd, lead, *l)).collect();
                assert!(values.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }
}
