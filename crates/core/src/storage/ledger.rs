use super::PgStore;
use crate::directory::SalesLedger;
use crate::domain::product::ProductId;
use crate::domain::sales::YearMonth;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;

// Refunded, cancelled and pending orders never count as demand.
const COUNTED_STATUSES: &str = "order_status IN ('completed', 'processing')";

#[async_trait::async_trait]
impl SalesLedger for PgStore {
    async fn total_quantity_sold(&self, product_id: ProductId, since: NaiveDate) -> Result<f64> {
        let total: f64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(quantity), 0)::DOUBLE PRECISION \
             FROM sales_lines \
             WHERE product_id = $1 AND sold_on >= $2 AND {COUNTED_STATUSES}"
        ))
        .persistent(false)
        .bind(product_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("sum sales_lines failed (product_id={product_id})"))?;
        Ok(total)
    }

    async fn monthly_quantity_sold(
        &self,
        product_id: ProductId,
    ) -> Result<BTreeMap<YearMonth, f64>> {
        let rows = sqlx::query_as::<_, (i32, i32, f64)>(&format!(
            "SELECT EXTRACT(YEAR FROM sold_on)::INTEGER, EXTRACT(MONTH FROM sold_on)::INTEGER, \
                    SUM(quantity)::DOUBLE PRECISION \
             FROM sales_lines \
             WHERE product_id = $1 AND {COUNTED_STATUSES} \
             GROUP BY 1, 2"
        ))
        .persistent(false)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("monthly sales_lines failed (product_id={product_id})"))?;

        Ok(rows
            .into_iter()
            .filter_map(|(year, month, qty)| {
                u32::try_from(month)
                    .ok()
                    .map(|m| (YearMonth::new(year, m), qty))
            })
            .collect())
    }

    async fn daily_quantity_series(
        &self,
        product_id: ProductId,
        since: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>> {
        let rows = sqlx::query_as::<_, (NaiveDate, f64)>(&format!(
            "SELECT sold_on, SUM(quantity)::DOUBLE PRECISION \
             FROM sales_lines \
             WHERE product_id = $1 AND sold_on >= $2 AND {COUNTED_STATUSES} \
             GROUP BY sold_on"
        ))
        .persistent(false)
        .bind(product_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("daily sales_lines failed (product_id={product_id})"))?;

        Ok(rows.into_iter().collect())
    }
}
