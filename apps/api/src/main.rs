//! Lead claim status API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod dto;
mod error;
mod handlers;
mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use axum::routing::get;
use leadclaim_core::AppError;
use leadclaim_infrastructure::{
    PostgresClaimResultRepository, PostgresJobRepository, PostgresPushEventLog,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api_config::{ApiConfig, init_tracing};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to connect to database: {error}")))?;

    leadclaim_infrastructure::run_migrations(&pool).await?;

    if config.migrate_only {
        info!("migrations applied");
        return Ok(());
    }

    let app_state = AppState {
        jobs: Arc::new(PostgresJobRepository::new(pool.clone())),
        results: Arc::new(PostgresClaimResultRepository::new(pool.clone())),
        events: Arc::new(PostgresPushEventLog::new(pool)),
    };

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/api/queue/stats", get(handlers::queue::queue_stats_handler))
        .route("/api/claims/recent", get(handlers::claims::recent_claims_handler))
        .route("/api/events/recent", get(handlers::events::recent_events_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "leadclaim-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
