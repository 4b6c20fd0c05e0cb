use crate::domain::supplier::SupplierId;
use anyhow::Context;
use sqlx::PgConnection;

// Advisory locks are scoped to the Postgres session; callers must release on the same connection.
const LOCK_NAMESPACE: i64 = 0x5245_4F52_4445_0000; // "REORDE"

pub fn lock_key_for_supplier(supplier_id: SupplierId) -> i64 {
    LOCK_NAMESPACE ^ supplier_id
}

pub async fn try_acquire_supplier_lock(
    conn: &mut PgConnection,
    supplier_id: SupplierId,
) -> anyhow::Result<bool> {
    let key = lock_key_for_supplier(supplier_id);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_supplier_lock(
    conn: &mut PgConnection,
    supplier_id: SupplierId,
) -> anyhow::Result<()> {
    let key = lock_key_for_supplier(supplier_id);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(conn)
        .await
        .with_context(|| format!("failed to release advisory lock (key={key})"))?;
    Ok(())
}
