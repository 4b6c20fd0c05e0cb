use crate::domain::product::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderReason {
    AtRop,
    ClosurePeriod,
    SafetyMargin,
    Predictive,
    Unknown,
}

impl ReorderReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AtRop => "at_rop",
            Self::ClosurePeriod => "closure_period",
            Self::SafetyMargin => "safety_margin",
            Self::Predictive => "predictive",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ReorderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosureImpact {
    pub closure_driven: bool,
    pub extra_days: i64,
    pub period_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub stage: String,
    pub values: BTreeMap<String, f64>,
}

/// Ordered record of the intermediate values behind one decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionTrace {
    entries: Vec<TraceEntry>,
}

impl DecisionTrace {
    pub fn record<I, K>(&mut self, stage: &str, values: I)
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.entries.push(TraceEntry {
            stage: stage.to_string(),
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        });
    }

    pub fn stage(&self, stage: &str) -> Option<&TraceEntry> {
        self.entries.iter().find(|e| e.stage == stage)
    }

    pub fn value(&self, stage: &str, key: &str) -> Option<f64> {
        self.stage(stage).and_then(|e| e.values.get(key).copied())
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderAnalysis {
    pub product_id: ProductId,
    pub sku: Option<String>,
    pub name: String,
    pub current_stock: i64,
    pub inbound_stock: i64,
    pub effective_stock: i64,
    pub avg_daily_sales: f64,
    pub safety_stock: i64,
    pub reorder_point: i64,
    pub optimal_stock: i64,
    /// Days until effective stock runs out at the forecast rate; `None` without demand.
    pub days_remaining: Option<f64>,
    pub base_lead_time: i64,
    pub adjusted_lead_time: i64,
    pub suggested_quantity: i64,
    pub needs_reorder: bool,
    pub reason: Option<ReorderReason>,
    pub closure: ClosureImpact,
    /// Price per unit behind `estimated_value`.
    #[serde(default)]
    pub unit_cost: Decimal,
    pub estimated_value: Decimal,
    pub trace: DecisionTrace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_keeps_stage_order() {
        let mut trace = DecisionTrace::default();
        trace.record("base_average", [("base", 2.0), ("age_days", 400.0)]);
        trace.record("trend", [("trended", 2.5)]);

        let stages: Vec<_> = trace.entries().iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(stages, vec!["base_average", "trend"]);
        assert_eq!(trace.value("trend", "trended"), Some(2.5));
        assert_eq!(trace.value("trend", "missing"), None);
    }

    #[test]
    fn reason_serializes_as_code() {
        let v = serde_json::to_value(ReorderReason::ClosurePeriod).unwrap();
        assert_eq!(v, serde_json::json!("closure_period"));
    }
}
