//! Collaborators the engine reads from and commits to. The engine never owns this data.

pub mod memory;

use crate::domain::analysis::ReorderAnalysis;
use crate::domain::product::{Product, ProductId};
use crate::domain::sales::YearMonth;
use crate::domain::supplier::{ClosedPeriod, Supplier, SupplierId};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Sold quantities from orders in completed or processing states.
#[async_trait::async_trait]
pub trait SalesLedger: Send + Sync {
    async fn total_quantity_sold(&self, product_id: ProductId, since: NaiveDate) -> Result<f64>;

    async fn monthly_quantity_sold(&self, product_id: ProductId)
        -> Result<BTreeMap<YearMonth, f64>>;

    /// Per-day totals from `since` onwards; days without sales are absent.
    async fn daily_quantity_series(
        &self,
        product_id: ProductId,
        since: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>>;
}

#[async_trait::async_trait]
pub trait InventoryDirectory: Send + Sync {
    async fn product(&self, product_id: ProductId) -> Result<Option<Product>>;

    async fn products_for_supplier(&self, supplier_id: SupplierId) -> Result<Vec<Product>>;

    /// Only called through `reorder::assignment::apply_supplier_assignment`.
    async fn set_product_supplier(
        &self,
        product_id: ProductId,
        supplier_id: Option<SupplierId>,
    ) -> Result<()>;
}

#[async_trait::async_trait]
pub trait SupplierDirectory: Send + Sync {
    async fn suppliers(&self) -> Result<Vec<Supplier>>;

    async fn supplier(&self, supplier_id: SupplierId) -> Result<Option<Supplier>>;

    async fn closure_presets(&self) -> Result<Vec<ClosedPeriod>>;

    async fn last_purchase_order_at(&self, supplier_id: SupplierId)
        -> Result<Option<DateTime<Utc>>>;
}

/// Commits suggestions as draft purchase orders, serialized per supplier.
#[async_trait::async_trait]
pub trait OrderDesk: Send + Sync {
    /// Returns `false` when another run holds the supplier.
    async fn try_lock_supplier(&self, supplier_id: SupplierId) -> Result<bool>;

    async fn unlock_supplier(&self, supplier_id: SupplierId) -> Result<()>;

    async fn create_draft_order(
        &self,
        supplier: &Supplier,
        lines: &[ReorderAnalysis],
        created_at: DateTime<Utc>,
    ) -> Result<Uuid>;
}
