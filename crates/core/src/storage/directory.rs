use super::PgStore;
use crate::directory::{InventoryDirectory, SupplierDirectory};
use crate::domain::product::{Product, ProductId};
use crate::domain::supplier::{ClosedPeriod, ClosedPeriodKind, Supplier, SupplierId};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

const PRODUCT_COLUMNS: &str = "id, name, sku, supplier_id, manage_stock, stock_quantity, \
     inbound_quantity, min_order_quantity, purchase_price, list_price, created_on";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    sku: Option<String>,
    supplier_id: Option<i64>,
    manage_stock: bool,
    stock_quantity: i64,
    inbound_quantity: i64,
    min_order_quantity: Option<i64>,
    purchase_price: Option<Decimal>,
    list_price: Option<Decimal>,
    created_on: NaiveDate,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            sku: row.sku,
            supplier_id: row.supplier_id,
            manage_stock: row.manage_stock,
            stock_quantity: row.stock_quantity,
            inbound_quantity: row.inbound_quantity,
            min_order_quantity: row.min_order_quantity,
            purchase_price: row.purchase_price,
            list_price: row.list_price,
            created_on: row.created_on,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ClosedPeriodRow {
    id: i64,
    supplier_id: Option<i64>,
    kind: String,
    name: Option<String>,
    start_day: i32,
    start_month: i32,
    end_day: i32,
    end_month: i32,
}

impl ClosedPeriodRow {
    // Out-of-range parts become 0, which the calendar drops as an invalid range.
    fn into_period(self) -> ClosedPeriod {
        let part = |v: i32| u32::try_from(v).unwrap_or(0);
        ClosedPeriod {
            id: self.id,
            name: self.name,
            kind: if self.kind == "preset" {
                ClosedPeriodKind::Preset
            } else {
                ClosedPeriodKind::Custom
            },
            start_day: part(self.start_day),
            start_month: part(self.start_month),
            end_day: part(self.end_day),
            end_month: part(self.end_month),
        }
    }
}

type SupplierRow = (i64, String, Option<i64>, Option<i64>, Vec<i64>);

fn supplier_from_row(row: SupplierRow, closed_periods: Vec<ClosedPeriod>) -> Supplier {
    let (id, name, lead_time_days, orders_per_year, preset_ids) = row;
    Supplier {
        id,
        name,
        lead_time_days,
        orders_per_year,
        preset_ids,
        closed_periods,
    }
}

impl PgStore {
    async fn custom_periods(
        &self,
        supplier_id: Option<SupplierId>,
    ) -> Result<HashMap<SupplierId, Vec<ClosedPeriod>>> {
        let rows = sqlx::query_as::<_, ClosedPeriodRow>(
            "SELECT id, supplier_id, kind, name, start_day, start_month, end_day, end_month \
             FROM closed_periods \
             WHERE kind = 'custom' AND supplier_id IS NOT NULL \
               AND ($1::BIGINT IS NULL OR supplier_id = $1) \
             ORDER BY id",
        )
        .persistent(false)
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await
        .context("select custom closed_periods failed")?;

        let mut out: HashMap<SupplierId, Vec<ClosedPeriod>> = HashMap::new();
        for row in rows {
            if let Some(owner) = row.supplier_id {
                out.entry(owner).or_default().push(row.into_period());
            }
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl InventoryDirectory for PgStore {
    async fn product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .persistent(false)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select product failed (id={product_id})"))?;
        Ok(row.map(Product::from))
    }

    async fn products_for_supplier(&self, supplier_id: SupplierId) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE supplier_id = $1 ORDER BY id"
        ))
        .persistent(false)
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("select products failed (supplier_id={supplier_id})"))?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn set_product_supplier(
        &self,
        product_id: ProductId,
        supplier_id: Option<SupplierId>,
    ) -> Result<()> {
        let res = sqlx::query("UPDATE products SET supplier_id = $2 WHERE id = $1")
            .persistent(false)
            .bind(product_id)
            .bind(supplier_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("update products.supplier_id failed (id={product_id})"))?;
        anyhow::ensure!(res.rows_affected() == 1, "product {product_id} not found");
        Ok(())
    }
}

#[async_trait::async_trait]
impl SupplierDirectory for PgStore {
    async fn suppliers(&self) -> Result<Vec<Supplier>> {
        let rows = sqlx::query_as::<_, SupplierRow>(
            "SELECT id, name, lead_time_days, orders_per_year, preset_ids \
             FROM suppliers ORDER BY id",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("select suppliers failed")?;

        let mut periods = self.custom_periods(None).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let own = periods.remove(&row.0).unwrap_or_default();
                supplier_from_row(row, own)
            })
            .collect())
    }

    async fn supplier(&self, supplier_id: SupplierId) -> Result<Option<Supplier>> {
        let row = sqlx::query_as::<_, SupplierRow>(
            "SELECT id, name, lead_time_days, orders_per_year, preset_ids \
             FROM suppliers WHERE id = $1",
        )
        .persistent(false)
        .bind(supplier_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select supplier failed (id={supplier_id})"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let own = self
            .custom_periods(Some(supplier_id))
            .await?
            .remove(&supplier_id)
            .unwrap_or_default();
        Ok(Some(supplier_from_row(row, own)))
    }

    async fn closure_presets(&self) -> Result<Vec<ClosedPeriod>> {
        let rows = sqlx::query_as::<_, ClosedPeriodRow>(
            "SELECT id, supplier_id, kind, name, start_day, start_month, end_day, end_month \
             FROM closed_periods WHERE kind = 'preset' ORDER BY id",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("select preset closed_periods failed")?;
        Ok(rows.into_iter().map(ClosedPeriodRow::into_period).collect())
    }

    async fn last_purchase_order_at(
        &self,
        supplier_id: SupplierId,
    ) -> Result<Option<DateTime<Utc>>> {
        let last: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(created_at) FROM purchase_orders WHERE supplier_id = $1")
                .persistent(false)
                .bind(supplier_id)
                .fetch_one(&self.pool)
                .await
                .with_context(|| {
                    format!("select last purchase order failed (supplier_id={supplier_id})")
                })?;
        Ok(last)
    }
}
