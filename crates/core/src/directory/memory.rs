use super::{InventoryDirectory, OrderDesk, SalesLedger, SupplierDirectory};
use crate::domain::analysis::ReorderAnalysis;
use crate::domain::product::{Product, ProductId};
use crate::domain::sales::{SaleLine, YearMonth};
use crate::domain::supplier::{ClosedPeriod, Supplier, SupplierId};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub suppliers: Vec<Supplier>,
    #[serde(default)]
    pub presets: Vec<ClosedPeriod>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub sales: Vec<SaleLine>,
    #[serde(default)]
    pub purchase_orders: Vec<PurchaseOrderRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderRecord {
    pub id: Uuid,
    pub supplier_id: SupplierId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub lines: Vec<DraftOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_cost: Decimal,
}

/// All collaborators backed by one in-process dataset (fixtures, dry runs, tests).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Mutex<Dataset>,
    locks: Mutex<HashSet<SupplierId>>,
}

impl InMemoryStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            data: Mutex::new(dataset),
            locks: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let dataset: Dataset =
            serde_json::from_str(text).context("fixture is not a valid dataset")?;
        Ok(Self::new(dataset))
    }

    pub fn snapshot(&self) -> Result<Dataset> {
        Ok(self.data()?.clone())
    }

    fn data(&self) -> Result<MutexGuard<'_, Dataset>> {
        self.data
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory dataset lock poisoned"))
    }

    fn locks(&self) -> Result<MutexGuard<'_, HashSet<SupplierId>>> {
        self.locks
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory supplier lock set poisoned"))
    }
}

#[async_trait::async_trait]
impl SalesLedger for InMemoryStore {
    async fn total_quantity_sold(&self, product_id: ProductId, since: NaiveDate) -> Result<f64> {
        Ok(self
            .data()?
            .sales
            .iter()
            .filter(|s| s.product_id == product_id && s.sold_on >= since)
            .map(|s| s.quantity)
            .sum())
    }

    async fn monthly_quantity_sold(
        &self,
        product_id: ProductId,
    ) -> Result<BTreeMap<YearMonth, f64>> {
        let mut out = BTreeMap::new();
        for sale in self.data()?.sales.iter().filter(|s| s.product_id == product_id) {
            let key = YearMonth::new(sale.sold_on.year(), sale.sold_on.month());
            *out.entry(key).or_insert(0.0) += sale.quantity;
        }
        Ok(out)
    }

    async fn daily_quantity_series(
        &self,
        product_id: ProductId,
        since: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>> {
        let mut out = BTreeMap::new();
        for sale in self
            .data()?
            .sales
            .iter()
            .filter(|s| s.product_id == product_id && s.sold_on >= since)
        {
            *out.entry(sale.sold_on).or_insert(0.0) += sale.quantity;
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl InventoryDirectory for InMemoryStore {
    async fn product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.data()?.products.iter().find(|p| p.id == product_id).cloned())
    }

    async fn products_for_supplier(&self, supplier_id: SupplierId) -> Result<Vec<Product>> {
        Ok(self
            .data()?
            .products
            .iter()
            .filter(|p| p.supplier_id == Some(supplier_id))
            .cloned()
            .collect())
    }

    async fn set_product_supplier(
        &self,
        product_id: ProductId,
        supplier_id: Option<SupplierId>,
    ) -> Result<()> {
        let mut data = self.data()?;
        let product = data
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .with_context(|| format!("product {product_id} not found"))?;
        product.supplier_id = supplier_id;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SupplierDirectory for InMemoryStore {
    async fn suppliers(&self) -> Result<Vec<Supplier>> {
        Ok(self.data()?.suppliers.clone())
    }

    async fn supplier(&self, supplier_id: SupplierId) -> Result<Option<Supplier>> {
        Ok(self.data()?.suppliers.iter().find(|s| s.id == supplier_id).cloned())
    }

    async fn closure_presets(&self) -> Result<Vec<ClosedPeriod>> {
        Ok(self.data()?.presets.clone())
    }

    async fn last_purchase_order_at(
        &self,
        supplier_id: SupplierId,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .data()?
            .purchase_orders
            .iter()
            .filter(|o| o.supplier_id == supplier_id)
            .map(|o| o.created_at)
            .max())
    }
}

#[async_trait::async_trait]
impl OrderDesk for InMemoryStore {
    async fn try_lock_supplier(&self, supplier_id: SupplierId) -> Result<bool> {
        Ok(self.locks()?.insert(supplier_id))
    }

    async fn unlock_supplier(&self, supplier_id: SupplierId) -> Result<()> {
        self.locks()?.remove(&supplier_id);
        Ok(())
    }

    async fn create_draft_order(
        &self,
        supplier: &Supplier,
        lines: &[ReorderAnalysis],
        created_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        anyhow::ensure!(!lines.is_empty(), "draft order needs at least one line");

        let id = Uuid::new_v4();
        let lines = lines
            .iter()
            .map(|a| DraftOrderLine {
                product_id: a.product_id,
                quantity: a.suggested_quantity,
                unit_cost: a.unit_cost,
            })
            .collect();

        self.data()?.purchase_orders.push(PurchaseOrderRecord {
            id,
            supplier_id: supplier.id,
            created_at,
            lines,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> InMemoryStore {
        let fixture = json!({
            "suppliers": [{"id": 1, "name": "Roastery", "lead_time_days": 10}],
            "products": [
                {"id": 5, "name": "Beans", "supplier_id": 1, "stock_quantity": 3, "created_on": "2025-01-01"},
                {"id": 6, "name": "Filters", "stock_quantity": 8, "created_on": "2025-01-01"}
            ],
            "sales": [
                {"product_id": 5, "sold_on": "2026-09-30", "quantity": 2.0},
                {"product_id": 5, "sold_on": "2026-10-01", "quantity": 1.0},
                {"product_id": 5, "sold_on": "2026-10-01", "quantity": 4.0},
                {"product_id": 6, "sold_on": "2026-10-01", "quantity": 9.0}
            ]
        });
        InMemoryStore::from_json(&fixture.to_string()).unwrap()
    }

    #[tokio::test]
    async fn aggregates_sales_per_product() {
        let store = store();
        let since = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();

        assert_eq!(store.total_quantity_sold(5, since).await.unwrap(), 5.0);

        let daily = store.daily_quantity_series(5, since).await.unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily.get(&since).copied(), Some(5.0));

        let monthly = store.monthly_quantity_sold(5).await.unwrap();
        assert_eq!(monthly.get(&YearMonth::new(2026, 9)).copied(), Some(2.0));
        assert_eq!(monthly.get(&YearMonth::new(2026, 10)).copied(), Some(5.0));
    }

    #[tokio::test]
    async fn supplier_lock_is_exclusive_until_released() {
        let store = store();
        assert!(store.try_lock_supplier(1).await.unwrap());
        assert!(!store.try_lock_supplier(1).await.unwrap());
        store.unlock_supplier(1).await.unwrap();
        assert!(store.try_lock_supplier(1).await.unwrap());
    }

    #[tokio::test]
    async fn reassigns_products() {
        let store = store();
        store.set_product_supplier(6, Some(1)).await.unwrap();
        assert_eq!(store.products_for_supplier(1).await.unwrap().len(), 2);
        assert!(store.set_product_supplier(99, Some(1)).await.is_err());
    }
}
