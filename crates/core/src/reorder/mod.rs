pub mod assignment;
pub mod decision;
pub mod orchestrator;

use crate::config::ReorderSettings;
use crate::directory::SalesLedger;
use crate::domain::analysis::{DecisionTrace, ReorderAnalysis};
use crate::domain::product::Product;
use crate::domain::supplier::{ClosedPeriod, Supplier};
use crate::forecast::safety::{SafetyStockCalculator, ServiceLevel};
use crate::forecast::{DemandForecastEngine, ForecastHorizon};
use crate::time::closures::{ClosurePeriodCalendar, LeadTimeAdjustment};
use chrono::NaiveDate;
use decision::{EvaluationInput, PredictivePolicy, ReorderDecisionEngine};
use std::sync::Arc;

/// Days of demand one order should cover, from the yearly order cadence.
pub fn days_of_stock_target(orders_per_year: i64) -> i64 {
    (365.0 / orders_per_year.clamp(1, 12) as f64).round() as i64
}

/// Per-supplier state shared by every product of one supplier in a run.
#[derive(Debug, Clone)]
pub struct SupplierContext {
    pub supplier: Supplier,
    pub calendar: ClosurePeriodCalendar,
    pub lead_time: LeadTimeAdjustment,
    pub days_of_stock_target: i64,
}

impl SupplierContext {
    pub fn new(
        supplier: Supplier,
        presets: &[ClosedPeriod],
        settings: &ReorderSettings,
        as_of: NaiveDate,
    ) -> Self {
        let calendar = ClosurePeriodCalendar::for_supplier(&supplier, presets, as_of);
        let base_lead_time = supplier.lead_time_or(settings.default_lead_time_days);
        let lead_time = calendar.adjusted_lead_time(base_lead_time);
        let days_of_stock_target =
            days_of_stock_target(supplier.orders_per_year_or(settings.orders_per_year));

        Self {
            supplier,
            calendar,
            lead_time,
            days_of_stock_target,
        }
    }
}

/// Forecast, safety stock and decision for single products.
#[derive(Clone)]
pub struct ReorderEvaluator {
    forecaster: DemandForecastEngine,
    safety: SafetyStockCalculator,
    decision: ReorderDecisionEngine,
    service_level: ServiceLevel,
}

impl ReorderEvaluator {
    pub fn new(ledger: Arc<dyn SalesLedger>, settings: &ReorderSettings) -> Self {
        Self {
            forecaster: DemandForecastEngine::new(ledger.clone(), settings.seasonal_enabled),
            safety: SafetyStockCalculator::new(ledger),
            decision: ReorderDecisionEngine::new(PredictivePolicy {
                enabled: settings.predictive_enabled,
                time_based: settings.time_prediction_enabled,
                safety_margin_percent: settings.safety_margin_percent,
            }),
            service_level: settings.service_level,
        }
    }

    pub async fn evaluate_product(
        &self,
        product: &Product,
        ctx: &SupplierContext,
        as_of: NaiveDate,
    ) -> anyhow::Result<ReorderAnalysis> {
        let mut trace = DecisionTrace::default();
        let horizon = ForecastHorizon {
            lead_time: ctx.lead_time.lead_time,
            days_of_stock_target: ctx.days_of_stock_target,
        };

        let forecast = self
            .forecaster
            .forecast(product, horizon, as_of, &mut trace)
            .await?;
        let safety = self
            .safety
            .calculate(product, ctx.lead_time.lead_time, self.service_level, as_of)
            .await?;
        trace.record(
            "safety_stock",
            [
                ("std_dev", safety.std_dev),
                ("z_score", safety.z_score),
                ("service_level", self.service_level.percent() as f64),
                ("safety_stock", safety.quantity as f64),
            ],
        );

        let input = EvaluationInput::from_product(
            product,
            forecast.avg_daily_sales,
            safety.quantity,
            &ctx.lead_time,
            ctx.days_of_stock_target,
        );
        Ok(self.decision.evaluate(&input, &ctx.calendar, trace))
    }
}
