use super::{ReorderEvaluator, SupplierContext};
use crate::config::ReorderSettings;
use crate::directory::{InventoryDirectory, OrderDesk, SalesLedger, SupplierDirectory};
use crate::domain::analysis::ReorderAnalysis;
use crate::domain::batch::{
    ProductError, SkipReason, SkippedSupplier, SuggestionBatch, SupplierSuggestions,
};
use crate::domain::product::ProductId;
use crate::domain::supplier::{ClosedPeriod, Supplier, SupplierId};
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub as_of: NaiveDate,
    /// Timestamp for the cooldown comparison and for committed draft orders.
    pub now: DateTime<Utc>,
    /// Empty means every supplier.
    pub supplier_ids: Vec<SupplierId>,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(as_of: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            as_of,
            now,
            supplier_ids: Vec::new(),
            dry_run: false,
        }
    }
}

enum SupplierOutcome {
    Evaluated(SupplierSuggestions),
    Skipped(SkipReason),
}

pub struct SuggestionOrchestrator {
    inventory: Arc<dyn InventoryDirectory>,
    suppliers: Arc<dyn SupplierDirectory>,
    orders: Arc<dyn OrderDesk>,
    evaluator: ReorderEvaluator,
    settings: ReorderSettings,
}

impl SuggestionOrchestrator {
    pub fn new(
        ledger: Arc<dyn SalesLedger>,
        inventory: Arc<dyn InventoryDirectory>,
        suppliers: Arc<dyn SupplierDirectory>,
        orders: Arc<dyn OrderDesk>,
        settings: ReorderSettings,
    ) -> Self {
        Self {
            inventory,
            suppliers,
            orders,
            evaluator: ReorderEvaluator::new(ledger, &settings),
            settings,
        }
    }

    pub fn settings(&self) -> &ReorderSettings {
        &self.settings
    }

    pub async fn run_batch(&self, opts: &RunOptions) -> anyhow::Result<SuggestionBatch> {
        let presets = self
            .suppliers
            .closure_presets()
            .await
            .context("load closure presets failed")?;
        let mut suppliers = self
            .suppliers
            .suppliers()
            .await
            .context("load suppliers failed")?;
        if !opts.supplier_ids.is_empty() {
            suppliers.retain(|s| opts.supplier_ids.contains(&s.id));
        }

        let mut batch = SuggestionBatch::new(opts.as_of, opts.now, opts.dry_run);

        for supplier in suppliers {
            match self.orders.try_lock_supplier(supplier.id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(supplier_id = supplier.id, "supplier locked by another run; skipping");
                    batch.skipped.push(SkippedSupplier {
                        supplier_id: supplier.id,
                        supplier_name: supplier.name.clone(),
                        reason: SkipReason::Locked,
                    });
                    continue;
                }
                Err(err) => {
                    tracing::error!(supplier_id = supplier.id, error = %format!("{err:#}"), "supplier lock failed");
                    batch
                        .suppliers
                        .push(SupplierSuggestions::failed(&supplier, format!("{err:#}")));
                    continue;
                }
            }

            let outcome = self.run_supplier(&supplier, &presets, opts).await;

            if let Err(err) = self.orders.unlock_supplier(supplier.id).await {
                tracing::warn!(supplier_id = supplier.id, error = %format!("{err:#}"), "supplier unlock failed");
            }

            match outcome {
                Ok(SupplierOutcome::Evaluated(entry)) => batch.suppliers.push(entry),
                Ok(SupplierOutcome::Skipped(reason)) => batch.skipped.push(SkippedSupplier {
                    supplier_id: supplier.id,
                    supplier_name: supplier.name.clone(),
                    reason,
                }),
                Err(err) => {
                    tracing::error!(supplier_id = supplier.id, error = %format!("{err:#}"), "supplier evaluation failed");
                    batch
                        .suppliers
                        .push(SupplierSuggestions::failed(&supplier, format!("{err:#}")));
                }
            }
        }

        let summary = batch.summary();
        tracing::info!(
            batch_id = %batch.id,
            as_of_date = %batch.as_of_date,
            dry_run = batch.dry_run,
            suppliers_evaluated = summary.suppliers_evaluated,
            suggestions_created = summary.suggestions_created,
            draft_orders_created = summary.draft_orders_created,
            skipped_cooldown = summary.skipped_cooldown,
            skipped_locked = summary.skipped_locked,
            errors = summary.errors,
            anomalies = summary.anomalies,
            "suggestion batch finished"
        );
        Ok(batch)
    }

    async fn run_supplier(
        &self,
        supplier: &Supplier,
        presets: &[ClosedPeriod],
        opts: &RunOptions,
    ) -> anyhow::Result<SupplierOutcome> {
        if let Some(last_order_at) = self
            .suppliers
            .last_purchase_order_at(supplier.id)
            .await
            .context("load last purchase order failed")?
        {
            if self.within_cooldown(last_order_at, opts.now) {
                tracing::info!(supplier_id = supplier.id, %last_order_at, "supplier in cooldown; skipping");
                return Ok(SupplierOutcome::Skipped(SkipReason::Cooldown { last_order_at }));
            }
        }

        let ctx = SupplierContext::new(supplier.clone(), presets, &self.settings, opts.as_of);
        if let Some(anomaly) = &ctx.lead_time.anomaly {
            tracing::warn!(supplier_id = supplier.id, %anomaly, "closure calendar anomaly; using base lead time");
        }

        let products = self
            .inventory
            .products_for_supplier(supplier.id)
            .await
            .with_context(|| format!("load products for supplier {} failed", supplier.id))?;

        let mut entry = SupplierSuggestions::new(supplier, ctx.lead_time.clone());
        for product in products.iter().filter(|p| p.manage_stock) {
            entry.products_evaluated += 1;
            match self.evaluator.evaluate_product(product, &ctx, opts.as_of).await {
                Ok(analysis) => {
                    tracing::debug!(
                        supplier_id = supplier.id,
                        product_id = product.id,
                        needs_reorder = analysis.needs_reorder,
                        suggested_quantity = analysis.suggested_quantity,
                        "product evaluated"
                    );
                    if analysis.needs_reorder {
                        entry.items.push(analysis);
                    }
                }
                Err(err) => {
                    tracing::warn!(supplier_id = supplier.id, product_id = product.id, error = %format!("{err:#}"), "product evaluation failed");
                    entry.product_errors.push(ProductError {
                        product_id: product.id,
                        error: format!("{err:#}"),
                    });
                }
            }
        }

        if !opts.dry_run && !entry.items.is_empty() {
            match self
                .orders
                .create_draft_order(supplier, &entry.items, opts.now)
                .await
            {
                Ok(id) => entry.draft_order_id = Some(id),
                Err(err) => {
                    tracing::error!(supplier_id = supplier.id, error = %format!("{err:#}"), "draft order commit failed");
                    entry.error = Some(format!("draft order commit failed: {err:#}"));
                }
            }
        }

        Ok(SupplierOutcome::Evaluated(entry))
    }

    fn within_cooldown(&self, last_order_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.settings.cooldown_days > 0
            && last_order_at > now - Duration::days(self.settings.cooldown_days)
    }

    /// Live evaluation of one product; `None` when the product does not exist.
    pub async fn evaluate_product(
        &self,
        product_id: ProductId,
        as_of: NaiveDate,
    ) -> anyhow::Result<Option<ReorderAnalysis>> {
        let Some(product) = self
            .inventory
            .product(product_id)
            .await
            .with_context(|| format!("load product {product_id} failed"))?
        else {
            return Ok(None);
        };

        let supplier = match product.supplier_id {
            Some(id) => self
                .suppliers
                .supplier(id)
                .await
                .with_context(|| format!("load supplier {id} failed"))?,
            None => None,
        }
        .unwrap_or_else(Supplier::unassigned);
        let presets = self
            .suppliers
            .closure_presets()
            .await
            .context("load closure presets failed")?;

        let ctx = SupplierContext::new(supplier, &presets, &self.settings, as_of);
        let analysis = self.evaluator.evaluate_product(&product, &ctx, as_of).await?;
        Ok(Some(analysis))
    }
}
