//! Postgres-backed collaborators and batch persistence.

pub mod directory;
pub mod ledger;
pub mod lock;
pub mod orders;
pub mod suggestions;

use crate::domain::supplier::SupplierId;
use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;
use tokio::sync::Mutex;

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// All collaborators over one connection pool.
///
/// Supplier locks are session-scoped advisory locks, so each held lock pins the pooled
/// connection that took it until `unlock_supplier` releases both.
pub struct PgStore {
    pool: PgPool,
    held_locks: Mutex<HashMap<SupplierId, PoolConnection<Postgres>>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            held_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
