use crate::domain::analysis::ReorderAnalysis;
use crate::domain::product::ProductId;
use crate::domain::supplier::{Supplier, SupplierId};
use crate::time::closures::{CalendarAnomaly, LeadTimeAdjustment};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionBatch {
    pub id: Uuid,
    pub as_of_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    pub suppliers: Vec<SupplierSuggestions>,
    pub skipped: Vec<SkippedSupplier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierSuggestions {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub lead_time: Option<LeadTimeAdjustment>,
    pub products_evaluated: usize,
    /// Only analyses that need a reorder.
    pub items: Vec<ReorderAnalysis>,
    pub product_errors: Vec<ProductError>,
    pub draft_order_id: Option<Uuid>,
    pub error: Option<String>,
}

impl SupplierSuggestions {
    pub fn new(supplier: &Supplier, lead_time: LeadTimeAdjustment) -> Self {
        Self {
            supplier_id: supplier.id,
            supplier_name: supplier.name.clone(),
            lead_time: Some(lead_time),
            products_evaluated: 0,
            items: Vec::new(),
            product_errors: Vec::new(),
            draft_order_id: None,
            error: None,
        }
    }

    pub fn failed(supplier: &Supplier, error: String) -> Self {
        Self {
            supplier_id: supplier.id,
            supplier_name: supplier.name.clone(),
            lead_time: None,
            products_evaluated: 0,
            items: Vec::new(),
            product_errors: Vec::new(),
            draft_order_id: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductError {
    pub product_id: ProductId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSupplier {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// A purchase order was created inside the cooldown window.
    Cooldown { last_order_at: DateTime<Utc> },
    /// Another run holds this supplier.
    Locked,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub suppliers_evaluated: usize,
    pub suggestions_created: usize,
    pub draft_orders_created: usize,
    pub skipped_cooldown: usize,
    pub skipped_locked: usize,
    pub errors: usize,
    pub anomalies: usize,
}

impl SuggestionBatch {
    pub fn new(as_of_date: NaiveDate, generated_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            as_of_date,
            generated_at,
            dry_run,
            suppliers: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn anomalies(&self) -> impl Iterator<Item = (SupplierId, &CalendarAnomaly)> {
        self.suppliers.iter().filter_map(|s| {
            s.lead_time
                .as_ref()
                .and_then(|lt| lt.anomaly.as_ref())
                .map(|a| (s.supplier_id, a))
        })
    }

    pub fn summary(&self) -> BatchSummary {
        let mut out = BatchSummary {
            anomalies: self.anomalies().count(),
            ..BatchSummary::default()
        };
        for s in &self.suppliers {
            if s.error.is_none() {
                out.suppliers_evaluated += 1;
            } else {
                out.errors += 1;
            }
            out.errors += s.product_errors.len();
            out.suggestions_created += s.items.len();
            if s.draft_order_id.is_some() {
                out.draft_orders_created += 1;
            }
        }
        for s in &self.skipped {
            match s.reason {
                SkipReason::Cooldown { .. } => out.skipped_cooldown += 1,
                SkipReason::Locked => out.skipped_locked += 1,
            }
        }
        out
    }
}
