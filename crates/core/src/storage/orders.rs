use super::{lock, PgStore};
use crate::directory::OrderDesk;
use crate::domain::analysis::ReorderAnalysis;
use crate::domain::supplier::{Supplier, SupplierId};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Connection;
use uuid::Uuid;

#[async_trait::async_trait]
impl OrderDesk for PgStore {
    async fn try_lock_supplier(&self, supplier_id: SupplierId) -> Result<bool> {
        let mut held = self.held_locks.lock().await;
        if held.contains_key(&supplier_id) {
            return Ok(false);
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .context("acquire connection for supplier lock failed")?;
        let acquired = lock::try_acquire_supplier_lock(&mut conn, supplier_id).await?;
        if acquired {
            held.insert(supplier_id, conn);
        }
        Ok(acquired)
    }

    async fn unlock_supplier(&self, supplier_id: SupplierId) -> Result<()> {
        let conn = self.held_locks.lock().await.remove(&supplier_id);
        let Some(mut conn) = conn else {
            return Ok(());
        };
        if let Err(err) = lock::release_supplier_lock(&mut conn, supplier_id).await {
            // Closing the session drops every advisory lock it holds.
            let _ = conn.detach().close().await;
            return Err(err);
        }
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
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        sqlx::query(
            "INSERT INTO purchase_orders (id, supplier_id, status, created_at) \
             VALUES ($1, $2, 'draft', $3)",
        )
        .persistent(false)
        .bind(id)
        .bind(supplier.id)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .context("insert purchase_orders failed")?;

        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO purchase_order_lines (purchase_order_id, product_id, quantity, unit_cost) ",
        );
        qb.push_values(lines, |mut b, line| {
            b.push_bind(id)
                .push_bind(line.product_id)
                .push_bind(line.suggested_quantity)
                .push_bind(line.unit_cost);
        });
        qb.build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("insert purchase_order_lines failed")?;

        tx.commit().await.context("commit transaction failed")?;

        tracing::info!(supplier_id = supplier.id, purchase_order_id = %id, lines = lines.len(), "draft purchase order created");
        Ok(id)
    }
}
