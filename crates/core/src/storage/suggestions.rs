use crate::domain::analysis::ReorderAnalysis;
use crate::domain::batch::{SkippedSupplier, SuggestionBatch, SupplierSuggestions};
use crate::time::closures::LeadTimeAdjustment;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

pub async fn persist_batch(pool: &sqlx::PgPool, batch: &SuggestionBatch) -> anyhow::Result<Uuid> {
    let summary = serde_json::to_value(batch.summary()).context("serialize summary failed")?;
    let skipped = serde_json::to_value(&batch.skipped).context("serialize skipped failed")?;

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query(
        "INSERT INTO suggestion_batches (id, as_of_date, generated_at, dry_run, summary, skipped) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .persistent(false)
    .bind(batch.id)
    .bind(batch.as_of_date)
    .bind(batch.generated_at)
    .bind(batch.dry_run)
    .bind(summary)
    .bind(skipped)
    .execute(&mut *tx)
    .await
    .context("insert suggestion_batches failed")?;

    for (position, entry) in batch.suppliers.iter().enumerate() {
        insert_supplier(&mut tx, batch.id, position as i32, entry).await?;
        for (item_position, item) in entry.items.iter().enumerate() {
            insert_item(&mut tx, batch.id, entry.supplier_id, item_position as i32, item).await?;
        }
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(batch.id)
}

async fn insert_supplier(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    batch_id: Uuid,
    position: i32,
    entry: &SupplierSuggestions,
) -> anyhow::Result<()> {
    let lead_time = entry
        .lead_time
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .context("serialize lead_time failed")?;
    let product_errors =
        serde_json::to_value(&entry.product_errors).context("serialize product_errors failed")?;

    sqlx::query(
        "INSERT INTO suggestion_suppliers \
         (batch_id, position, supplier_id, supplier_name, lead_time, products_evaluated, \
          product_errors, draft_order_id, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .persistent(false)
    .bind(batch_id)
    .bind(position)
    .bind(entry.supplier_id)
    .bind(&entry.supplier_name)
    .bind(lead_time)
    .bind(entry.products_evaluated as i64)
    .bind(product_errors)
    .bind(entry.draft_order_id)
    .bind(&entry.error)
    .execute(&mut **tx)
    .await
    .context("insert suggestion_suppliers failed")?;

    Ok(())
}

async fn insert_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    batch_id: Uuid,
    supplier_id: i64,
    position: i32,
    item: &ReorderAnalysis,
) -> anyhow::Result<()> {
    let analysis = serde_json::to_value(item).context("serialize analysis failed")?;

    sqlx::query(
        "INSERT INTO suggestion_items \
         (batch_id, supplier_id, position, product_id, suggested_quantity, reason, \
          estimated_value, analysis) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .persistent(false)
    .bind(batch_id)
    .bind(supplier_id)
    .bind(position)
    .bind(item.product_id)
    .bind(item.suggested_quantity)
    .bind(item.reason.as_ref().map(|r| r.as_str()))
    .bind(item.estimated_value)
    .bind(analysis)
    .execute(&mut **tx)
    .await
    .context("insert suggestion_items failed")?;

    Ok(())
}

/// Latest batch for `as_of_date`, or the latest batch overall when `None`.
pub async fn fetch_batch(
    pool: &sqlx::PgPool,
    as_of_date: Option<NaiveDate>,
) -> anyhow::Result<Option<SuggestionBatch>> {
    type BatchRow = (Uuid, NaiveDate, DateTime<Utc>, bool, Value);

    let row = match as_of_date {
        Some(d) => {
            sqlx::query_as::<_, BatchRow>(
                "SELECT id, as_of_date, generated_at, dry_run, skipped \
                 FROM suggestion_batches \
                 WHERE as_of_date = $1 \
                 ORDER BY generated_at DESC \
                 LIMIT 1",
            )
            .bind(d)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, BatchRow>(
                "SELECT id, as_of_date, generated_at, dry_run, skipped \
                 FROM suggestion_batches \
                 ORDER BY as_of_date DESC, generated_at DESC \
                 LIMIT 1",
            )
            .fetch_optional(pool)
            .await?
        }
    };

    let Some((id, as_of_date, generated_at, dry_run, skipped)) = row else {
        return Ok(None);
    };

    let skipped: Vec<SkippedSupplier> = serde_json::from_value(skipped)
        .with_context(|| format!("invalid skipped JSON in DB for batch_id={id}"))?;
    let suppliers = fetch_suppliers(pool, id).await?;

    Ok(Some(SuggestionBatch {
        id,
        as_of_date,
        generated_at,
        dry_run,
        suppliers,
        skipped,
    }))
}

async fn fetch_suppliers(
    pool: &sqlx::PgPool,
    batch_id: Uuid,
) -> anyhow::Result<Vec<SupplierSuggestions>> {
    let rows = sqlx::query_as::<
        _,
        (
            i64,
            String,
            Option<Value>,
            i64,
            Value,
            Option<Uuid>,
            Option<String>,
        ),
    >(
        "SELECT supplier_id, supplier_name, lead_time, products_evaluated, product_errors, \
                draft_order_id, error \
         FROM suggestion_suppliers \
         WHERE batch_id = $1 \
         ORDER BY position ASC",
    )
    .bind(batch_id)
    .fetch_all(pool)
    .await?;

    let items = sqlx::query_as::<_, (i64, Value)>(
        "SELECT supplier_id, analysis \
         FROM suggestion_items \
         WHERE batch_id = $1 \
         ORDER BY supplier_id, position ASC",
    )
    .bind(batch_id)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for (supplier_id, supplier_name, lead_time, evaluated, errors, draft_order_id, error) in rows {
        let lead_time: Option<LeadTimeAdjustment> = lead_time
            .map(serde_json::from_value)
            .transpose()
            .with_context(|| format!("invalid lead_time JSON in DB for supplier_id={supplier_id}"))?;
        let product_errors = serde_json::from_value(errors).with_context(|| {
            format!("invalid product_errors JSON in DB for supplier_id={supplier_id}")
        })?;

        let mut supplier_items = Vec::new();
        for (_, analysis) in items.iter().filter(|(id, _)| *id == supplier_id) {
            let analysis: ReorderAnalysis = serde_json::from_value(analysis.clone())
                .with_context(|| format!("invalid analysis JSON in DB for batch_id={batch_id}"))?;
            supplier_items.push(analysis);
        }

        out.push(SupplierSuggestions {
            supplier_id,
            supplier_name,
            lead_time,
            products_evaluated: usize::try_from(evaluated).unwrap_or(0),
            items: supplier_items,
            product_errors,
            draft_order_id,
            error,
        });
    }
    Ok(out)
}
