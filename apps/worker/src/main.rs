//! Lead claim worker runtime.

#![forbid(unsafe_code)]

mod config;

use std::sync::Arc;
use std::time::Duration;

use leadclaim_application::{
    AuthTokenCache, CachedTokenProvider, ClaimDispatchService, ClaimResultRepository,
    EventLogRetention, IngestionService, JobRepository, LeadPoller, LiveListener, PushEventLog,
    ResultRecorder, TokenProvider, WorkerPool,
};
use leadclaim_core::{AppError, AppResult};
use leadclaim_infrastructure::{
    HttpClaimStrategy, HttpLeadListingSource, HttpTokenProvider, InMemoryAuthTokenCache,
    InMemoryClaimResultRepository, InMemoryJobRepository, InMemoryPushEventLog,
    PostgresClaimResultRepository, PostgresJobRepository, PostgresPushEventLog,
    RedisAuthTokenCache, SignalRPushConnector, run_migrations,
};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{JobStoreConfig, TokenCacheConfig, WorkerConfig};

struct Stores {
    jobs: Arc<dyn JobRepository>,
    results: Arc<dyn ClaimResultRepository>,
    events: Arc<dyn PushEventLog>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let stores = build_stores(&config).await?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let tokens = build_token_provider(&config, http_client.clone())?;

    let mut dispatcher = ClaimDispatchService::new(
        tokens.clone(),
        Arc::new(HttpClaimStrategy::new(
            http_client.clone(),
            config.claim_api_root.as_str(),
            config.claim_timeout,
        )?),
        ResultRecorder::new(stores.results.clone()),
        stores.jobs.clone(),
    );
    if let Some(dealer_id) = config.dealer_id {
        dispatcher = dispatcher.with_dealer_id(config.region.clone(), dealer_id);
    }
    let dispatcher = Arc::new(dispatcher);
    let ingestion = IngestionService::new(stores.jobs.clone());

    info!(
        region = %config.region,
        max_parallel = config.pool.max_parallel,
        claim_timeout_ms = config.claim_timeout.as_millis() as u64,
        poller = config.listing.is_some(),
        push = config.push.is_some(),
        auto_claim = config.push.as_ref().is_some_and(|push| push.auto_claim),
        "leadclaim-worker started"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut adapters = JoinSet::new();

    if let Some(listing) = &config.listing {
        let mut poller = LeadPoller::new(
            Arc::new(HttpLeadListingSource::new(
                http_client.clone(),
                listing.url.as_str(),
                listing.cookie.clone(),
            )?),
            ingestion.clone(),
            config.region.clone(),
            listing.poll_interval,
        );
        if listing.use_bearer {
            poller = poller.with_bearer(tokens.clone());
        }

        let shutdown = shutdown_rx.clone();
        adapters.spawn(async move { poller.run(shutdown).await });
    }

    if let Some(push) = &config.push {
        let mut listener = LiveListener::new(
            Arc::new(SignalRPushConnector::new(
                http_client.clone(),
                push.hub_url.as_str(),
                config.dealer_id,
            )?),
            tokens.clone(),
            config.region.clone(),
            ingestion.clone(),
        )
        .with_reconnect_policy(push.reconnect)
        .with_max_in_flight(config.pool.max_parallel);
        if push.auto_claim {
            listener = listener.with_auto_claim(dispatcher.clone());
        }
        if push.event_log {
            listener = listener.with_event_log(stores.events.clone());

            let retention =
                EventLogRetention::new(stores.events.clone(), push.event_retention_days)?;
            let shutdown = shutdown_rx.clone();
            adapters.spawn(async move { retention.run(shutdown).await });
        }

        let shutdown = shutdown_rx.clone();
        adapters.spawn(async move { listener.run(shutdown).await });
    }

    tokio::spawn(relay_shutdown(tokio::signal::ctrl_c(), shutdown_tx));

    let mut pool = WorkerPool::new(stores.jobs.clone(), dispatcher, config.pool)?;
    pool.run(shutdown_rx).await;

    while let Some(joined) = adapters.join_next().await {
        if let Err(error) = joined {
            warn!(error = %error, "background task failed");
        }
    }

    info!("leadclaim-worker stopped");
    Ok(())
}

async fn build_stores(config: &WorkerConfig) -> AppResult<Stores> {
    match &config.job_store {
        JobStoreConfig::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(u32::try_from(config.pool.max_parallel + 2).unwrap_or(u32::MAX))
                .connect(database_url.as_str())
                .await
                .map_err(|error| {
                    AppError::Unavailable(format!("failed to connect to database: {error}"))
                })?;
            run_migrations(&pool).await?;

            Ok(Stores {
                jobs: Arc::new(PostgresJobRepository::new(pool.clone())),
                results: Arc::new(PostgresClaimResultRepository::new(pool.clone())),
                events: Arc::new(PostgresPushEventLog::new(pool)),
            })
        }
        JobStoreConfig::Memory => {
            warn!("using the in-memory job store; queued jobs are lost on exit");
            Ok(Stores {
                jobs: Arc::new(InMemoryJobRepository::new()),
                results: Arc::new(InMemoryClaimResultRepository::new()),
                events: Arc::new(InMemoryPushEventLog::new()),
            })
        }
    }
}

fn build_token_provider(
    config: &WorkerConfig,
    http_client: reqwest::Client,
) -> AppResult<Arc<dyn TokenProvider>> {
    let provider: Arc<dyn TokenProvider> = Arc::new(HttpTokenProvider::new(
        http_client,
        config.token_service_url.as_str(),
        config.token_service_secret.clone(),
    )?);

    let cache: Arc<dyn AuthTokenCache> = match &config.token_cache {
        TokenCacheConfig::Disabled => return Ok(provider),
        TokenCacheConfig::Memory => Arc::new(InMemoryAuthTokenCache::new()),
        TokenCacheConfig::Redis { redis_url } => {
            let client = redis::Client::open(redis_url.as_str()).map_err(|error| {
                AppError::Validation(format!("invalid REDIS_URL '{redis_url}': {error}"))
            })?;
            Arc::new(RedisAuthTokenCache::new(client, "leadclaim:token"))
        }
    };

    Ok(Arc::new(CachedTokenProvider::new(
        provider,
        cache,
        chrono::Duration::seconds(config.token_refresh_skew_seconds),
    )))
}

/// Signals shutdown once `signal` fires. If the signal cannot be awaited the sender is held
/// forever, since dropping it would also read as a shutdown.
async fn relay_shutdown<F>(signal: F, shutdown_tx: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("shutdown requested; draining in-flight claims");
            let _ = shutdown_tx.send(true);
        }
        Err(error) => {
            warn!(error = %error, "failed to listen for shutdown signal; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
