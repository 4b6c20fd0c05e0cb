use crate::domain::analysis::{ClosureImpact, DecisionTrace, ReorderAnalysis, ReorderReason};
use crate::domain::product::{Product, ProductId};
use crate::time::closures::{ClosurePeriodCalendar, LeadTimeAdjustment};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictivePolicy {
    pub enabled: bool,
    /// Also flag products expected to reach the reorder point within the predictive window.
    pub time_based: bool,
    pub safety_margin_percent: f64,
}

impl Default for PredictivePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            time_based: false,
            safety_margin_percent: 20.0,
        }
    }
}

/// Everything the decision needs about one product, already forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationInput {
    pub product_id: ProductId,
    pub sku: Option<String>,
    pub name: String,
    pub current_stock: i64,
    pub inbound_stock: i64,
    pub min_order_quantity: i64,
    pub unit_cost: Decimal,
    pub forecast: f64,
    pub safety_stock: i64,
    pub base_lead_time: i64,
    pub adjusted_lead_time: i64,
    pub days_of_stock_target: i64,
}

impl EvaluationInput {
    pub fn from_product(
        product: &Product,
        forecast: f64,
        safety_stock: i64,
        lead_time: &LeadTimeAdjustment,
        days_of_stock_target: i64,
    ) -> Self {
        Self {
            product_id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            current_stock: product.on_hand(),
            inbound_stock: product.inbound(),
            min_order_quantity: product.moq(),
            unit_cost: product.unit_cost(),
            forecast,
            safety_stock,
            base_lead_time: lead_time.base_lead_time,
            adjusted_lead_time: lead_time.lead_time,
            days_of_stock_target,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReorderDecisionEngine {
    policy: PredictivePolicy,
}

impl ReorderDecisionEngine {
    pub fn new(policy: PredictivePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PredictivePolicy {
        &self.policy
    }

    pub fn evaluate(
        &self,
        input: &EvaluationInput,
        calendar: &ClosurePeriodCalendar,
        mut trace: DecisionTrace,
    ) -> ReorderAnalysis {
        let forecast = if input.forecast.is_finite() {
            input.forecast.max(0.0)
        } else {
            0.0
        };
        let current = input.current_stock.max(0);
        let inbound = input.inbound_stock.max(0);
        let safety = input.safety_stock.max(0);
        let base_lead = input.base_lead_time.max(1);
        let adjusted_lead = input.adjusted_lead_time.max(base_lead);
        let target_days = input.days_of_stock_target.max(0);

        let effective = current + inbound;
        let reorder_point = (forecast * adjusted_lead as f64 + safety as f64).ceil() as i64;
        let optimal_stock = (forecast * target_days as f64).ceil() as i64 + safety;
        let at_or_below_rop = effective <= reorder_point;
        trace.record(
            "reorder_point",
            [
                ("effective_stock", effective as f64),
                ("adjusted_lead_time", adjusted_lead as f64),
                ("reorder_point", reorder_point as f64),
                ("optimal_stock", optimal_stock as f64),
            ],
        );

        let closure_risk = calendar.closure_depletion_risk(effective as f64, forecast, adjusted_lead);
        if let Some(risk) = &closure_risk {
            trace.record(
                "closure",
                [
                    ("stockout_in_days", risk.stockout_in_days),
                    ("extra_days", risk.extra_days as f64),
                ],
            );
        }

        let mut within_safety_margin = false;
        let mut will_reach_rop_soon = false;
        if self.policy.enabled {
            let threshold = reorder_point as f64 * (1.0 + self.policy.safety_margin_percent / 100.0);
            within_safety_margin = effective as f64 <= threshold;
            let mut values = vec![("safety_margin_threshold", threshold)];

            if self.policy.time_based && forecast > 0.0 {
                let days_until_rop = (effective - reorder_point) as f64 / forecast;
                // Base lead time: the adjusted one already folds in any delivery-day closure.
                let horizon = 2 * base_lead;
                let today = calendar.today();
                let closed_days =
                    calendar.closed_days_between(today, today + Duration::days(horizon));
                let window = (horizon + closed_days) as f64;
                will_reach_rop_soon = days_until_rop <= window;
                values.push(("days_until_rop", days_until_rop));
                values.push(("predictive_window", window));
            }
            trace.record("predictive", values);
        }

        let needs_closure_order = closure_risk.is_some();
        let needs_reorder = forecast > 0.0
            && (at_or_below_rop || within_safety_margin || will_reach_rop_soon || needs_closure_order);

        let reason = if !needs_reorder {
            None
        } else if at_or_below_rop {
            Some(ReorderReason::AtRop)
        } else if needs_closure_order {
            Some(ReorderReason::ClosurePeriod)
        } else if within_safety_margin {
            Some(ReorderReason::SafetyMargin)
        } else if will_reach_rop_soon {
            Some(ReorderReason::Predictive)
        } else {
            Some(ReorderReason::Unknown)
        };

        let mut suggested_quantity = 0;
        if needs_reorder {
            let stock_at_arrival = effective as f64 - forecast * adjusted_lead as f64;
            let base_qty = ((optimal_stock as f64 - stock_at_arrival).ceil() as i64).max(1);
            let closure_buffer = closure_risk
                .as_ref()
                .map(|r| (forecast * r.extra_days as f64).ceil() as i64)
                .unwrap_or(0);
            suggested_quantity = base_qty + closure_buffer;
            if input.min_order_quantity > 1 && input.min_order_quantity > suggested_quantity {
                suggested_quantity = input.min_order_quantity;
            }
            trace.record(
                "quantity",
                [
                    ("stock_at_arrival", stock_at_arrival),
                    ("base_quantity", base_qty as f64),
                    ("closure_buffer", closure_buffer as f64),
                    ("suggested_quantity", suggested_quantity as f64),
                ],
            );
        }

        let closure = match &closure_risk {
            Some(risk) => ClosureImpact {
                closure_driven: true,
                extra_days: risk.extra_days,
                period_name: Some(risk.period.label()),
            },
            None => ClosureImpact::default(),
        };

        ReorderAnalysis {
            product_id: input.product_id,
            sku: input.sku.clone(),
            name: input.name.clone(),
            current_stock: current,
            inbound_stock: inbound,
            effective_stock: effective,
            avg_daily_sales: forecast,
            safety_stock: safety,
            reorder_point,
            optimal_stock,
            days_remaining: (forecast > 0.0).then(|| effective as f64 / forecast),
            base_lead_time: base_lead,
            adjusted_lead_time: adjusted_lead,
            suggested_quantity,
            needs_reorder,
            reason,
            closure,
            unit_cost: input.unit_cost,
            estimated_value: input.unit_cost * Decimal::from(suggested_quantity),
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::supplier::{ClosedPeriod, ClosedPeriodKind};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn open_calendar(today: NaiveDate) -> ClosurePeriodCalendar {
        ClosurePeriodCalendar::from_periods(&[] as &[ClosedPeriod], today)
    }

    fn holiday_calendar(today: NaiveDate) -> ClosurePeriodCalendar {
        let period = ClosedPeriod {
            id: 1,
            name: Some("Winter break".to_string()),
            kind: ClosedPeriodKind::Preset,
            start_day: 20,
            start_month: 12,
            end_day: 5,
            end_month: 1,
        };
        ClosurePeriodCalendar::from_periods(&[period], today)
    }

    fn input(current: i64, forecast: f64, safety: i64) -> EvaluationInput {
        EvaluationInput {
            product_id: 42,
            sku: Some("SKU-42".to_string()),
            name: "Drip kettle".to_string(),
            current_stock: current,
            inbound_stock: 0,
            min_order_quantity: 1,
            unit_cost: Decimal::new(250, 2),
            forecast,
            safety_stock: safety,
            base_lead_time: 14,
            adjusted_lead_time: 14,
            days_of_stock_target: 91,
        }
    }

    fn predictive(time_based: bool) -> ReorderDecisionEngine {
        ReorderDecisionEngine::new(PredictivePolicy {
            enabled: true,
            time_based,
            safety_margin_percent: 20.0,
        })
    }

    #[test]
    fn at_reorder_point_triggers_reorder() {
        let engine = ReorderDecisionEngine::default();
        let a = engine.evaluate(&input(10, 2.0, 5), &open_calendar(d(2026, 10, 19)), DecisionTrace::default());

        assert_eq!(a.reorder_point, 33);
        assert_eq!(a.effective_stock, 10);
        assert!(a.needs_reorder);
        assert_eq!(a.reason, Some(ReorderReason::AtRop));
        // optimal 187, arrival 10 - 28 = -18
        assert_eq!(a.optimal_stock, 187);
        assert_eq!(a.suggested_quantity, 205);
        assert_eq!(a.estimated_value, Decimal::new(51250, 2));
        assert_eq!(a.unit_cost, Decimal::new(250, 2));
        assert_eq!(a.days_remaining, Some(5.0));
    }

    #[test]
    fn inbound_stock_counts_towards_effective_stock() {
        let engine = ReorderDecisionEngine::default();
        let mut i = input(10, 2.0, 5);
        i.inbound_stock = 30;
        let a = engine.evaluate(&i, &open_calendar(d(2026, 10, 19)), DecisionTrace::default());
        assert_eq!(a.effective_stock, 40);
        assert!(!a.needs_reorder);
        assert_eq!(a.reason, None);
        assert_eq!(a.suggested_quantity, 0);
        assert_eq!(a.estimated_value, Decimal::ZERO);
        assert_eq!(a.unit_cost, Decimal::new(250, 2));
    }

    #[test]
    fn zero_forecast_never_reorders() {
        let engine = predictive(true);
        let a = engine.evaluate(&input(0, 0.0, 0), &holiday_calendar(d(2026, 12, 10)), DecisionTrace::default());
        assert!(!a.needs_reorder);
        assert_eq!(a.suggested_quantity, 0);
        assert_eq!(a.days_remaining, None);
        assert!(!a.closure.closure_driven);
    }

    #[test]
    fn moq_raises_small_quantities() {
        let engine = ReorderDecisionEngine::default();
        let mut i = input(12, 1.0, 0);
        i.days_of_stock_target = 10;
        let a = engine.evaluate(&i, &open_calendar(d(2026, 10, 19)), DecisionTrace::default());
        assert_eq!(a.trace.value("quantity", "suggested_quantity"), Some(12.0));
        assert_eq!(a.suggested_quantity, 12);

        i.min_order_quantity = 50;
        let a = engine.evaluate(&i, &open_calendar(d(2026, 10, 19)), DecisionTrace::default());
        assert_eq!(a.suggested_quantity, 50);
    }

    #[test]
    fn upcoming_closure_adds_buffer() {
        let engine = ReorderDecisionEngine::default();
        let mut i = input(100, 2.0, 0);
        i.days_of_stock_target = 30;
        let a = engine.evaluate(&i, &holiday_calendar(d(2026, 10, 19)), DecisionTrace::default());

        assert!(a.needs_reorder);
        assert_eq!(a.reason, Some(ReorderReason::ClosurePeriod));
        assert!(a.closure.closure_driven);
        assert_eq!(a.closure.extra_days, 92);
        assert_eq!(a.closure.period_name.as_deref(), Some("Winter break"));
        // base quantity max(1, 60 - 72) = 1, buffer 2 * 92
        assert_eq!(a.suggested_quantity, 185);
    }

    #[test]
    fn safety_margin_flags_stock_just_above_rop() {
        let a = predictive(false).evaluate(&input(38, 2.0, 5), &open_calendar(d(2026, 10, 19)), DecisionTrace::default());
        assert!(a.needs_reorder);
        assert_eq!(a.reason, Some(ReorderReason::SafetyMargin));

        let a = ReorderDecisionEngine::default().evaluate(
            &input(38, 2.0, 5),
            &open_calendar(d(2026, 10, 19)),
            DecisionTrace::default(),
        );
        assert!(!a.needs_reorder);
    }

    #[test]
    fn time_based_prediction_flags_approaching_rop() {
        let a = predictive(true).evaluate(&input(60, 2.0, 5), &open_calendar(d(2026, 10, 19)), DecisionTrace::default());
        assert!(a.needs_reorder);
        assert_eq!(a.reason, Some(ReorderReason::Predictive));
        assert_eq!(a.trace.value("predictive", "days_until_rop"), Some(13.5));
    }

    #[test]
    fn predictive_window_stretches_over_closed_days() {
        // rop 33; 93 units last 30 days above rop, window is 28 days plus closures
        let engine = predictive(true);
        let today = d(2026, 12, 1);

        let open = engine.evaluate(&input(93, 2.0, 5), &open_calendar(today), DecisionTrace::default());
        assert!(!open.needs_reorder);

        let closed = engine.evaluate(&input(93, 2.0, 5), &holiday_calendar(today), DecisionTrace::default());
        assert!(closed.needs_reorder);
        assert_eq!(closed.reason, Some(ReorderReason::Predictive));
        assert_eq!(closed.trace.value("predictive", "predictive_window"), Some(37.0));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let engine = predictive(true);
        let cal = holiday_calendar(d(2026, 10, 19));
        let i = input(70, 1.7, 4);
        let a = engine.evaluate(&i, &cal, DecisionTrace::default());
        let b = engine.evaluate(&i, &cal, DecisionTrace::default());
        assert_eq!(a, b);
    }
}
