use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reorder_core::domain::analysis::ReorderAnalysis;
use reorder_core::domain::batch::{BatchSummary, SuggestionBatch};
use reorder_core::reorder::orchestrator::SuggestionOrchestrator;
use reorder_core::storage::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = reorder_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();
    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match reorder_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let orchestrator = pool.clone().map(|pool| {
        let store = Arc::new(PgStore::new(pool));
        Arc::new(SuggestionOrchestrator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            settings.reorder.clone(),
        ))
    });

    let state = AppState { pool, orchestrator };
    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/batches/latest", get(get_latest_batch))
        .route("/batches/:as_of_date", get(get_batch_by_date))
        .route("/products/:product_id/analysis", get(get_product_analysis))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    pool: Option<PgPool>,
    orchestrator: Option<Arc<SuggestionOrchestrator>>,
}

#[derive(Debug, Serialize)]
struct ApiBatch {
    summary: BatchSummary,
    batch: SuggestionBatch,
}

impl From<SuggestionBatch> for ApiBatch {
    fn from(batch: SuggestionBatch) -> Self {
        Self {
            summary: batch.summary(),
            batch,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisQuery {
    as_of_date: Option<String>,
}

fn parse_date(s: &str) -> Result<NaiveDate, StatusCode> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %format!("{e:#}"), "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_latest_batch(State(state): State<AppState>) -> Result<Json<ApiBatch>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let batch = reorder_core::storage::suggestions::fetch_batch(pool, None)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(batch.into()))
}

async fn get_batch_by_date(
    State(state): State<AppState>,
    Path(as_of_date): Path<String>,
) -> Result<Json<ApiBatch>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let as_of_date = parse_date(&as_of_date)?;

    let batch = reorder_core::storage::suggestions::fetch_batch(pool, Some(as_of_date))
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(batch.into()))
}

async fn get_product_analysis(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<ReorderAnalysis>, StatusCode> {
    let Some(orchestrator) = &state.orchestrator else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let as_of_date = match query.as_of_date.as_deref() {
        Some(s) => parse_date(s)?,
        None => chrono::Utc::now().date_naive(),
    };

    let analysis = orchestrator
        .evaluate_product(product_id, as_of_date)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(analysis))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &reorder_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
