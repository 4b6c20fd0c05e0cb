use anyhow::Context;
use clap::{Parser, Subcommand};
use reorder_core::config::Settings;
use reorder_core::directory::memory::InMemoryStore;
use reorder_core::directory::{InventoryDirectory, OrderDesk, SalesLedger, SupplierDirectory};
use reorder_core::domain::batch::SuggestionBatch;
use reorder_core::reorder::assignment::assign_supplier_bulk;
use reorder_core::reorder::orchestrator::{RunOptions, SuggestionOrchestrator};
use reorder_core::storage::PgStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "reorder_worker")]
struct Args {
    /// As-of date (YYYY-MM-DD). Defaults to today's UTC date.
    #[arg(long, global = true)]
    as_of_date: Option<String>,

    /// Evaluate without creating draft orders or storing the batch.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Only evaluate these suppliers (repeatable).
    #[arg(long = "supplier", global = true)]
    suppliers: Vec<i64>,

    /// Read collaborators from a JSON dataset instead of Postgres.
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Override REORDER_COOLDOWN_DAYS for this run.
    #[arg(long, global = true)]
    cooldown_days: Option<i64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one suggestion batch (default).
    Run,
    /// Assign products to a supplier, or detach them when --to is omitted.
    Assign {
        #[arg(long = "product", required = true)]
        products: Vec<i64>,
        #[arg(long = "to")]
        supplier: Option<i64>,
    },
}

/// Collaborators served by one store, plus the pool when it is Postgres.
struct Backend {
    ledger: Arc<dyn SalesLedger>,
    inventory: Arc<dyn InventoryDirectory>,
    suppliers: Arc<dyn SupplierDirectory>,
    orders: Arc<dyn OrderDesk>,
    pool: Option<sqlx::PgPool>,
}

impl Backend {
    fn from_store<S>(store: Arc<S>, pool: Option<sqlx::PgPool>) -> Self
    where
        S: SalesLedger + InventoryDirectory + SupplierDirectory + OrderDesk + 'static,
    {
        Self {
            ledger: store.clone(),
            inventory: store.clone(),
            suppliers: store.clone(),
            orders: store,
            pool,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Some(days) = args.cooldown_days {
        settings.reorder.cooldown_days = days;
        settings.reorder.validate()?;
    }

    let result = match &args.command {
        Some(Command::Assign { products, supplier }) => assign(&args, &settings, products, *supplier).await,
        Some(Command::Run) | None => run(&args, &settings).await,
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker run failed");
    }
    result
}

async fn run(args: &Args, settings: &Settings) -> anyhow::Result<()> {
    let as_of_date = resolve_as_of_date(args.as_of_date.as_deref())?;
    let backend = connect(args, settings).await?;

    let orchestrator = SuggestionOrchestrator::new(
        backend.ledger,
        backend.inventory,
        backend.suppliers,
        backend.orders,
        settings.reorder.clone(),
    );
    let opts = RunOptions {
        supplier_ids: args.suppliers.clone(),
        dry_run: args.dry_run,
        ..RunOptions::new(as_of_date, chrono::Utc::now())
    };

    let batch = orchestrator.run_batch(&opts).await?;
    report_anomalies(&batch);

    match backend.pool {
        Some(pool) if !args.dry_run => {
            let batch_id = reorder_core::storage::suggestions::persist_batch(&pool, &batch).await?;
            tracing::info!(%as_of_date, %batch_id, "persisted suggestion batch");
        }
        _ => {
            let json = serde_json::to_string_pretty(&batch).context("serialize batch failed")?;
            println!("{json}");
        }
    }
    Ok(())
}

async fn assign(
    args: &Args,
    settings: &Settings,
    products: &[i64],
    supplier: Option<i64>,
) -> anyhow::Result<()> {
    let backend = connect(args, settings).await?;
    let report = assign_supplier_bulk(
        backend.inventory.as_ref(),
        backend.suppliers.as_ref(),
        products,
        supplier,
    )
    .await;

    for failure in &report.failed {
        tracing::warn!(product_id = failure.product_id, error = %failure.error, "assignment failed");
    }
    tracing::info!(
        assigned = report.assigned.len(),
        failed = report.failed.len(),
        supplier_id = ?supplier,
        "supplier assignment finished"
    );
    anyhow::ensure!(report.failed.is_empty(), "{} assignment(s) failed", report.failed.len());
    Ok(())
}

async fn connect(args: &Args, settings: &Settings) -> anyhow::Result<Backend> {
    if let Some(path) = &args.fixture {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read fixture {} failed", path.display()))?;
        let store = InMemoryStore::from_json(&text)?;
        tracing::info!(fixture = %path.display(), "using in-memory dataset");
        return Ok(Backend::from_store(Arc::new(store), None));
    }

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    reorder_core::storage::migrate(&pool).await?;

    Ok(Backend::from_store(Arc::new(PgStore::new(pool.clone())), Some(pool)))
}

fn report_anomalies(batch: &SuggestionBatch) {
    for (supplier_id, anomaly) in batch.anomalies() {
        sentry::capture_message(
            &format!("closure calendar anomaly for supplier {supplier_id}: {anomaly}"),
            sentry::Level::Warning,
        );
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn resolve_as_of_date(as_of_date_arg: Option<&str>) -> anyhow::Result<chrono::NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --as-of-date {s:?}"));
    }
    Ok(chrono::Utc::now().date_naive())
}
