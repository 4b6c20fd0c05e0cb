pub mod safety;
pub mod seasonal;
pub mod trend;

use crate::directory::SalesLedger;
use crate::domain::analysis::DecisionTrace;
use crate::domain::product::Product;
use chrono::NaiveDate;
use seasonal::{SeasonalProfile, SeasonalValidation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandForecast {
    pub base_average: f64,
    pub recent_average: f64,
    pub trended_average: f64,
    pub seasonal: Option<SeasonalValidation>,
    pub seasonal_factor: f64,
    /// Final adjusted average daily sales, never negative.
    pub avg_daily_sales: f64,
}

impl DemandForecast {
    fn dormant() -> Self {
        Self {
            base_average: 0.0,
            recent_average: 0.0,
            trended_average: 0.0,
            seasonal: None,
            seasonal_factor: 1.0,
            avg_daily_sales: 0.0,
        }
    }
}

/// Inputs that shape the forward-looking seasonal window.
#[derive(Debug, Clone, Copy)]
pub struct ForecastHorizon {
    pub lead_time: i64,
    pub days_of_stock_target: i64,
}

#[derive(Clone)]
pub struct DemandForecastEngine {
    ledger: Arc<dyn SalesLedger>,
    seasonal_enabled: bool,
}

impl DemandForecastEngine {
    pub fn new(ledger: Arc<dyn SalesLedger>, seasonal_enabled: bool) -> Self {
        Self {
            ledger,
            seasonal_enabled,
        }
    }

    pub async fn forecast(
        &self,
        product: &Product,
        horizon: ForecastHorizon,
        as_of: NaiveDate,
        trace: &mut DecisionTrace,
    ) -> anyhow::Result<DemandForecast> {
        let age_days = product.age_days(as_of);

        let total = self
            .ledger
            .total_quantity_sold(product.id, trend::window_start(as_of, trend::BASE_WINDOW_DAYS))
            .await?;
        let base = trend::base_average(total, age_days);
        trace.record(
            "base_average",
            [
                ("total_sold", total),
                ("age_days", age_days as f64),
                ("base_average", base),
            ],
        );

        if base <= 0.0 {
            tracing::debug!(product_id = product.id, "no sales in base window");
            return Ok(DemandForecast::dormant());
        }

        let recent_total = self
            .ledger
            .total_quantity_sold(product.id, trend::window_start(as_of, trend::RECENT_WINDOW_DAYS))
            .await?;
        let recent = recent_total / trend::RECENT_WINDOW_DAYS as f64;
        let trended = trend::trend_adjustment(base, recent, age_days);
        trace.record(
            "trend",
            [("recent_average", recent), ("trended_average", trended)],
        );

        let mut validation = None;
        let mut factor = 1.0;
        if self.seasonal_enabled && age_days >= seasonal::MIN_HISTORY_DAYS {
            let monthly = self.ledger.monthly_quantity_sold(product.id).await?;
            let profile = SeasonalProfile::from_monthly(&monthly);
            if profile.validation.is_valid {
                factor = profile.coverage_factor(
                    as_of,
                    horizon.lead_time,
                    horizon.days_of_stock_target,
                );
            }
            trace.record(
                "seasonal",
                [
                    ("correlation", profile.validation.correlation),
                    ("years_compared", profile.validation.years_compared as f64),
                    ("valid", if profile.validation.is_valid { 1.0 } else { 0.0 }),
                    ("factor", factor),
                ],
            );
            validation = Some(profile.validation);
        }

        let avg_daily_sales = trend::combined_cap(trended * factor, base).max(0.0);
        trace.record("forecast", [("avg_daily_sales", avg_daily_sales)]);

        Ok(DemandForecast {
            base_average: base,
            recent_average: recent,
            trended_average: trended,
            seasonal: validation,
            seasonal_factor: factor,
            avg_daily_sales,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::{Dataset, InMemoryStore};
    use crate::domain::sales::SaleLine;
    use chrono::{Datelike, Duration};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn product(created_on: NaiveDate) -> Product {
        Product {
            id: 1,
            name: "Cold brew".to_string(),
            sku: None,
            supplier_id: Some(1),
            manage_stock: true,
            stock_quantity: 10,
            inbound_quantity: 0,
            min_order_quantity: None,
            purchase_price: None,
            list_price: None,
            created_on,
        }
    }

    fn engine(sales: Vec<SaleLine>, seasonal: bool) -> DemandForecastEngine {
        let store = InMemoryStore::new(Dataset {
            sales,
            ..Default::default()
        });
        DemandForecastEngine::new(Arc::new(store), seasonal)
    }

    fn horizon() -> ForecastHorizon {
        ForecastHorizon {
            lead_time: 14,
            days_of_stock_target: 91,
        }
    }

    /// One sale per day from `from` to `to` inclusive, quantity picked per month.
    fn daily_sales(from: NaiveDate, to: NaiveDate, qty: impl Fn(u32) -> f64) -> Vec<SaleLine> {
        let mut out = Vec::new();
        let mut day = from;
        while day <= to {
            out.push(SaleLine {
                product_id: 1,
                sold_on: day,
                quantity: qty(day.month()),
            });
            day = day + Duration::days(1);
        }
        out
    }

    #[tokio::test]
    async fn no_sales_forecasts_zero() {
        let mut trace = DecisionTrace::default();
        let f = engine(vec![], true)
            .forecast(&product(d(2024, 1, 1)), horizon(), d(2026, 10, 19), &mut trace)
            .await
            .unwrap();
        assert_eq!(f.avg_daily_sales, 0.0);
        assert!(trace.stage("base_average").is_some());
    }

    #[tokio::test]
    async fn steady_demand_forecasts_its_rate() {
        let as_of = d(2026, 10, 19);
        let sales = daily_sales(as_of - Duration::days(364), as_of, |_| 2.0);
        let mut trace = DecisionTrace::default();
        let f = engine(sales, false)
            .forecast(&product(d(2024, 1, 1)), horizon(), as_of, &mut trace)
            .await
            .unwrap();
        assert!((f.base_average - 2.0).abs() < 1e-9);
        assert!((f.avg_daily_sales - 2.0).abs() < 1e-9);
        assert!(f.seasonal.is_none());
        assert!(trace.stage("seasonal").is_none());
    }

    #[tokio::test]
    async fn young_product_skips_seasonality() {
        let as_of = d(2026, 10, 19);
        let created = as_of - Duration::days(20);
        let sales = daily_sales(created, as_of, |_| 1.0);
        let mut trace = DecisionTrace::default();
        let f = engine(sales, true)
            .forecast(&product(created), horizon(), as_of, &mut trace)
            .await
            .unwrap();
        // 21 units over 20 days of age; trend needs 30 days of history.
        assert!((f.base_average - 1.05).abs() < 1e-9);
        assert_eq!(f.trended_average, f.base_average);
        assert!(f.seasonal.is_none());
    }

    #[tokio::test]
    async fn seasonal_peak_lifts_forecast_within_caps() {
        let as_of = d(2026, 5, 1);
        let sales = daily_sales(d(2024, 1, 1), d(2026, 4, 30), |m| match m {
            6..=8 => 10.0,
            _ => 1.0,
        });
        let mut trace = DecisionTrace::default();
        let f = engine(sales, true)
            .forecast(
                &product(d(2024, 1, 1)),
                ForecastHorizon {
                    lead_time: 31,
                    days_of_stock_target: 61,
                },
                as_of,
                &mut trace,
            )
            .await
            .unwrap();

        let validation = f.seasonal.clone().unwrap();
        assert!(validation.is_valid);
        assert!(f.seasonal_factor > 1.0);
        assert!(f.avg_daily_sales > f.trended_average);
        assert!(f.avg_daily_sales <= 10.0 * f.base_average);
        assert!(f.avg_daily_sales >= 0.4 * f.base_average);
        assert_eq!(trace.value("seasonal", "valid"), Some(1.0));
    }
}
