use std::str::FromStr;
use std::time::Duration;

use leadclaim_application::{ReconnectPolicy, WorkerPoolSettings};
use leadclaim_core::{AppError, AppResult, Region};
use leadclaim_domain::EVENT_LOG_RETENTION_DAYS;

/// Backing store for claim jobs and results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStoreConfig {
    /// Shared PostgreSQL database.
    Postgres {
        /// Connection string.
        database_url: String,
    },
    /// Process-local store.
    Memory,
}

/// Cache in front of the token service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCacheConfig {
    /// Fetch a fresh token for every claim.
    Disabled,
    /// Process-local cache.
    Memory,
    /// Redis cache shared by workers.
    Redis {
        /// Connection string.
        redis_url: String,
    },
}

/// Pending-leads poller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingConfig {
    /// Listing endpoint.
    pub url: String,
    /// Raw `Cookie` header value.
    pub cookie: Option<String>,
    /// Whether a bearer token is sent with listing requests.
    pub use_bearer: bool,
    /// Time between polling cycles.
    pub poll_interval: Duration,
}

/// Push-channel listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConfig {
    /// SignalR hub URL.
    pub hub_url: String,
    /// Claim directly from events instead of enqueueing.
    pub auto_claim: bool,
    /// Reconnect backoff.
    pub reconnect: ReconnectPolicy,
    /// Whether received events are written to the push event log.
    pub event_log: bool,
    /// Days of logged events kept before purging.
    pub event_retention_days: i64,
}

/// Worker process configuration, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub claim_api_root: String,
    pub region: Region,
    pub dealer_id: Option<i64>,
    pub claim_timeout: Duration,
    pub pool: WorkerPoolSettings,
    pub job_store: JobStoreConfig,
    pub token_service_url: String,
    pub token_service_secret: String,
    pub token_cache: TokenCacheConfig,
    pub token_refresh_skew_seconds: i64,
    pub listing: Option<ListingConfig>,
    pub push: Option<PushConfig>,
}

impl WorkerConfig {
    /// Loads configuration from process environment.
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let env = EnvReader { lookup: &lookup };

        let claim_api_root = env
            .required("CLAIM_API_ROOT")?
            .trim_end_matches('/')
            .to_owned();
        let region = Region::new(env.optional("REGION").unwrap_or_else(|| "Central FL".to_owned()))?;
        let dealer_id = env.parse_optional::<i64>("DEALER_ID")?;

        let max_parallel = env.parse_positive::<usize>("MAX_PARALLEL_CLAIMS", 5)?;
        let idle_interval_ms = env.parse_positive::<u64>("WORKER_IDLE_INTERVAL_MS", 1_000)?;
        let store_retry_ms = env.parse_positive::<u64>("WORKER_STORE_RETRY_MS", 2_000)?;
        let claim_timeout_ms = env.parse_positive::<u64>("CLAIM_TIMEOUT_MS", 20_000)?;

        let job_store = match env
            .optional("JOB_STORE")
            .unwrap_or_else(|| "postgres".to_owned())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => JobStoreConfig::Postgres {
                database_url: env.required("DATABASE_URL")?,
            },
            "memory" => JobStoreConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "JOB_STORE must be 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        let token_service_url = env.required("TOKEN_SERVICE_URL")?;
        let token_service_secret = env.required("TOKEN_SERVICE_SECRET")?;
        let token_cache = match env
            .optional("TOKEN_CACHE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_ascii_lowercase()
            .as_str()
        {
            "none" => TokenCacheConfig::Disabled,
            "memory" => TokenCacheConfig::Memory,
            "redis" => TokenCacheConfig::Redis {
                redis_url: env.required("REDIS_URL")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "TOKEN_CACHE must be 'none', 'memory' or 'redis', got '{other}'"
                )));
            }
        };
        let token_refresh_skew_seconds = env.parse_or::<i64>("TOKEN_REFRESH_SKEW_SECONDS", 60)?;
        if token_refresh_skew_seconds < 0 {
            return Err(AppError::Validation(
                "TOKEN_REFRESH_SKEW_SECONDS must not be negative".to_owned(),
            ));
        }

        let listing = match env.optional("LEAD_LISTING_URL") {
            Some(url) => Some(ListingConfig {
                url,
                cookie: env.optional("LEAD_LISTING_COOKIE"),
                use_bearer: env.parse_bool("LEAD_LISTING_USE_BEARER", true)?,
                poll_interval: Duration::from_millis(
                    env.parse_positive::<u64>("POLL_INTERVAL_MS", 30_000)?,
                ),
            }),
            None => None,
        };

        let push = match env.optional("PUSH_HUB_URL") {
            Some(hub_url) => Some(PushConfig {
                hub_url,
                auto_claim: env.parse_bool("AUTO_CLAIM", false)?,
                reconnect: ReconnectPolicy {
                    max_attempts: env.parse_or::<u32>("PUSH_RECONNECT_MAX_ATTEMPTS", 10)?,
                    initial_backoff: Duration::from_millis(
                        env.parse_positive::<u64>("PUSH_RECONNECT_INITIAL_MS", 1_000)?,
                    ),
                    max_backoff: Duration::from_millis(
                        env.parse_positive::<u64>("PUSH_RECONNECT_MAX_MS", 30_000)?,
                    ),
                },
                event_log: env.parse_bool("PUSH_EVENT_LOG", true)?,
                event_retention_days: env
                    .parse_positive::<i64>("PUSH_EVENT_RETENTION_DAYS", EVENT_LOG_RETENTION_DAYS)?,
            }),
            None => None,
        };

        Ok(Self {
            claim_api_root,
            region,
            dealer_id,
            claim_timeout: Duration::from_millis(claim_timeout_ms),
            pool: WorkerPoolSettings {
                max_parallel,
                idle_interval: Duration::from_millis(idle_interval_ms),
                store_retry_interval: Duration::from_millis(store_retry_ms),
            },
            job_store,
            token_service_url,
            token_service_secret,
            token_cache,
            token_refresh_skew_seconds,
            listing,
            push,
        })
    }
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &str) -> AppResult<String> {
        self.optional(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    fn parse_optional<T>(&self, name: &str) -> AppResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(name)
            .map(|value| {
                value.parse::<T>().map_err(|error| {
                    AppError::Validation(format!("invalid {name} value '{value}': {error}"))
                })
            })
            .transpose()
    }

    fn parse_or<T>(&self, name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_optional(name)?.unwrap_or(default))
    }

    fn parse_positive<T>(&self, name: &str, default: T) -> AppResult<T>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: std::fmt::Display,
    {
        let value = self.parse_or(name, default)?;
        if value <= T::default() {
            return Err(AppError::Validation(format!(
                "{name} must be greater than zero"
            )));
        }

        Ok(value)
    }

    fn parse_bool(&self, name: &str, default: bool) -> AppResult<bool> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(AppError::Validation(format!(
                    "invalid {name} value '{value}': expected true or false"
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{JobStoreConfig, TokenCacheConfig, WorkerConfig};

    fn load(pairs: &[(&str, &str)]) -> leadclaim_core::AppResult<WorkerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        WorkerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const BASE: [(&str, &str); 4] = [
        ("CLAIM_API_ROOT", "https://crm.example.com/api/"),
        ("TOKEN_SERVICE_URL", "https://tokens.example.com/issue"),
        ("TOKEN_SERVICE_SECRET", "s3cret"),
        ("JOB_STORE", "memory"),
    ];

    #[test]
    fn defaults_apply() {
        let config = load(&BASE).unwrap_or_else(|_| unreachable!());

        assert_eq!(config.claim_api_root, "https://crm.example.com/api");
        assert_eq!(config.region.as_str(), "Central FL");
        assert_eq!(config.pool.max_parallel, 5);
        assert_eq!(config.pool.idle_interval, Duration::from_secs(1));
        assert_eq!(config.claim_timeout, Duration::from_secs(20));
        assert_eq!(config.job_store, JobStoreConfig::Memory);
        assert_eq!(config.token_cache, TokenCacheConfig::Memory);
        assert!(config.listing.is_none());
        assert!(config.push.is_none());
    }

    #[test]
    fn missing_required_value_fails() {
        let result = load(&BASE[1..]);
        assert!(result.is_err());

        let postgres_without_url = load(&[
            ("CLAIM_API_ROOT", "https://crm.example.com"),
            ("TOKEN_SERVICE_URL", "https://tokens.example.com"),
            ("TOKEN_SERVICE_SECRET", "s3cret"),
        ]);
        assert!(postgres_without_url.is_err());
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("MAX_PARALLEL_CLAIMS", "0"));
        assert!(load(&pairs).is_err());
    }

    #[test]
    fn ingestion_adapters_are_enabled_by_their_urls() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("LEAD_LISTING_URL", "https://crm.example.com/api/leads"),
            ("LEAD_LISTING_USE_BEARER", "false"),
            ("POLL_INTERVAL_MS", "3000"),
            ("PUSH_HUB_URL", "https://crm.example.com/hubs/leads"),
            ("AUTO_CLAIM", "true"),
            ("DEALER_ID", "4242"),
        ]);

        let config = load(&pairs).unwrap_or_else(|_| unreachable!());

        let listing = config.listing.unwrap_or_else(|| unreachable!());
        assert!(!listing.use_bearer);
        assert_eq!(listing.poll_interval, Duration::from_secs(3));
        let push = config.push.unwrap_or_else(|| unreachable!());
        assert!(push.auto_claim);
        assert_eq!(push.reconnect.max_attempts, 10);
        assert!(push.event_log);
        assert_eq!(push.event_retention_days, 7);
        assert_eq!(config.dealer_id, Some(4242));
    }

    #[test]
    fn unknown_store_and_bad_bool_are_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("TOKEN_CACHE", "disk"));
        assert!(load(&pairs).is_err());

        let mut pairs = BASE.to_vec();
        pairs.extend([("PUSH_HUB_URL", "https://hub"), ("AUTO_CLAIM", "maybe")]);
        assert!(load(&pairs).is_err());
    }

    #[test]
    fn event_log_settings_are_read() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("PUSH_HUB_URL", "https://hub"),
            ("PUSH_EVENT_LOG", "off"),
            ("PUSH_EVENT_RETENTION_DAYS", "30"),
        ]);
        let push = load(&pairs)
            .unwrap_or_else(|_| unreachable!())
            .push
            .unwrap_or_else(|| unreachable!());
        assert!(!push.event_log);
        assert_eq!(push.event_retention_days, 30);

        let mut pairs = BASE.to_vec();
        pairs.extend([("PUSH_HUB_URL", "https://hub"), ("PUSH_EVENT_RETENTION_DAYS", "0")]);
        assert!(load(&pairs).is_err());
    }
}
