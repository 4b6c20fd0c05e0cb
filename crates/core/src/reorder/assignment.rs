//! Product-to-supplier assignment. Single and bulk updates share one routine.

use crate::directory::{InventoryDirectory, SupplierDirectory};
use crate::domain::product::ProductId;
use crate::domain::supplier::SupplierId;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Points a product at a supplier, or detaches it with `None`.
pub async fn apply_supplier_assignment(
    inventory: &dyn InventoryDirectory,
    suppliers: &dyn SupplierDirectory,
    product_id: ProductId,
    supplier_id: Option<SupplierId>,
) -> anyhow::Result<()> {
    let product = inventory
        .product(product_id)
        .await
        .with_context(|| format!("load product {product_id} failed"))?
        .with_context(|| format!("product {product_id} not found"))?;

    if let Some(id) = supplier_id {
        let exists = suppliers
            .supplier(id)
            .await
            .with_context(|| format!("load supplier {id} failed"))?
            .is_some();
        anyhow::ensure!(exists, "supplier {id} not found");
    }

    if product.supplier_id == supplier_id {
        return Ok(());
    }

    inventory
        .set_product_supplier(product_id, supplier_id)
        .await
        .with_context(|| format!("assign product {product_id} failed"))?;
    tracing::info!(
        product_id,
        from = ?product.supplier_id,
        to = ?supplier_id,
        "product supplier updated"
    );
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentReport {
    pub assigned: Vec<ProductId>,
    pub failed: Vec<AssignmentFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentFailure {
    pub product_id: ProductId,
    pub error: String,
}

pub async fn assign_supplier_bulk(
    inventory: &dyn InventoryDirectory,
    suppliers: &dyn SupplierDirectory,
    product_ids: &[ProductId],
    supplier_id: Option<SupplierId>,
) -> AssignmentReport {
    let mut report = AssignmentReport::default();
    for &product_id in product_ids {
        match apply_supplier_assignment(inventory, suppliers, product_id, supplier_id).await {
            Ok(()) => report.assigned.push(product_id),
            Err(err) => report.failed.push(AssignmentFailure {
                product_id,
                error: format!("{err:#}"),
            }),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::InMemoryStore;
    use serde_json::json;

    fn store() -> InMemoryStore {
        let fixture = json!({
            "suppliers": [
                {"id": 1, "name": "Roastery"},
                {"id": 2, "name": "Paper goods"}
            ],
            "products": [
                {"id": 5, "name": "Beans", "supplier_id": 1, "stock_quantity": 3, "created_on": "2025-01-01"},
                {"id": 6, "name": "Filters", "stock_quantity": 8, "created_on": "2025-01-01"},
                {"id": 7, "name": "Cups", "stock_quantity": 8, "created_on": "2025-01-01"}
            ]
        });
        InMemoryStore::from_json(&fixture.to_string()).unwrap()
    }

    #[tokio::test]
    async fn assigns_and_detaches() {
        let store = store();
        apply_supplier_assignment(&store, &store, 6, Some(2)).await.unwrap();
        assert_eq!(store.product(6).await.unwrap().unwrap().supplier_id, Some(2));

        apply_supplier_assignment(&store, &store, 5, None).await.unwrap();
        assert_eq!(store.product(5).await.unwrap().unwrap().supplier_id, None);
    }

    #[tokio::test]
    async fn rejects_unknown_supplier() {
        let store = store();
        let err = apply_supplier_assignment(&store, &store, 6, Some(9))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("supplier 9 not found"));
        assert_eq!(store.product(6).await.unwrap().unwrap().supplier_id, None);
    }

    #[tokio::test]
    async fn bulk_reports_each_product() {
        let store = store();
        let report = assign_supplier_bulk(&store, &store, &[6, 7, 404], Some(2)).await;
        assert_eq!(report.assigned, vec![6, 7]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].product_id, 404);
        assert_eq!(store.products_for_supplier(2).await.unwrap().len(), 2);
    }
}
