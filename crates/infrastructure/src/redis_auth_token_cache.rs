//! Redis-backed bearer token cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadclaim_application::AuthTokenCache;
use leadclaim_core::{AppError, AppResult, AuthContext, Region};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

#[derive(Debug, Serialize, Deserialize)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Redis implementation of the token cache port, shared across worker processes.
#[derive(Clone)]
pub struct RedisAuthTokenCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisAuthTokenCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    /// Keys on the exact region name, percent-encoded.
    fn key_for(&self, region: &Region) -> String {
        let encoded: String = form_urlencoded::byte_serialize(region.as_str().as_bytes()).collect();
        format!("{}:region={encoded}", self.key_prefix)
    }

    fn decode(region: &Region, value: &str) -> AppResult<AuthContext> {
        let cached: CachedToken = serde_json::from_str(value).map_err(|error| {
            AppError::Internal(format!(
                "invalid token cache entry for region '{region}': {error}"
            ))
        })?;

        Ok(AuthContext::new(
            region.clone(),
            cached.token,
            cached.expires_at,
        ))
    }
}

#[async_trait]
impl AuthTokenCache for RedisAuthTokenCache {
    async fn get_token(&self, region: &Region) -> AppResult<Option<AuthContext>> {
        let key = self.key_for(region);
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))?;

        let encoded: Option<String> = connection.get(key).await.map_err(|error| {
            AppError::Unavailable(format!("failed to read token cache entry: {error}"))
        })?;

        encoded
            .as_deref()
            .map(|value| Self::decode(region, value))
            .transpose()
    }

    async fn set_token(&self, context: &AuthContext, ttl_seconds: u32) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let key = self.key_for(context.region());
        let value = serde_json::to_string(&CachedToken {
            token: context.bearer_token().to_owned(),
            expires_at: context.expires_at(),
        })
        .map_err(|error| AppError::Internal(format!("failed to encode token cache entry: {error}")))?;

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))?;

        connection
            .set_ex(key, value, u64::from(ttl_seconds))
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to write token cache entry: {error}"))
            })
    }
}
