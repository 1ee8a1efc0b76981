//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_claim_strategy;
mod http_lead_listing_source;
mod http_token_provider;
mod in_memory_auth_token_cache;
mod in_memory_claim_result_repository;
mod in_memory_job_repository;
mod in_memory_push_event_log;
mod postgres_claim_result_repository;
mod postgres_job_repository;
mod postgres_push_event_log;
mod redis_auth_token_cache;
mod signalr_push_channel;

use leadclaim_core::{AppError, AppResult};
use sqlx::PgPool;
use sqlx::migrate::Migrator;

pub use http_claim_strategy::HttpClaimStrategy;
pub use http_lead_listing_source::HttpLeadListingSource;
pub use http_token_provider::HttpTokenProvider;
pub use in_memory_auth_token_cache::InMemoryAuthTokenCache;
pub use in_memory_claim_result_repository::InMemoryClaimResultRepository;
pub use in_memory_job_repository::InMemoryJobRepository;
pub use in_memory_push_event_log::InMemoryPushEventLog;
pub use postgres_claim_result_repository::PostgresClaimResultRepository;
pub use postgres_job_repository::PostgresJobRepository;
pub use postgres_push_event_log::PostgresPushEventLog;
pub use redis_auth_token_cache::RedisAuthTokenCache;
pub use signalr_push_channel::SignalRPushConnector;

/// Embedded schema migrations for every worker table.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applies pending schema migrations.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to run migrations: {error}")))
}
