use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use leadclaim_core::{AppResult, AuthContext, Region};
use tracing::{debug, warn};

use crate::claim_ports::{AuthTokenCache, TokenProvider};

/// Token provider that reuses cached credentials until they approach expiry.
///
/// Cache failures degrade to a fresh fetch from the wrapped provider.
#[derive(Clone)]
pub struct CachedTokenProvider {
    inner: Arc<dyn TokenProvider>,
    cache: Arc<dyn AuthTokenCache>,
    refresh_skew: Duration,
}

impl CachedTokenProvider {
    /// Creates a caching provider.
    #[must_use]
    pub fn new(
        inner: Arc<dyn TokenProvider>,
        cache: Arc<dyn AuthTokenCache>,
        refresh_skew: Duration,
    ) -> Self {
        Self {
            inner,
            cache,
            refresh_skew,
        }
    }
}

#[async_trait]
impl TokenProvider for CachedTokenProvider {
    async fn fetch_token(&self, region: &Region) -> AppResult<AuthContext> {
        let now = Utc::now();
        match self.cache.get_token(region).await {
            Ok(Some(context)) if !context.is_expiring(now, self.refresh_skew) => {
                return Ok(context);
            }
            Ok(_) => {}
            Err(error) => {
                warn!(region = %region, error = %error, "token cache read failed");
            }
        }

        let context = self.inner.fetch_token(region).await?;
        let usable_for = context.expires_at() - self.refresh_skew - now;
        let ttl_seconds = u32::try_from(usable_for.num_seconds()).unwrap_or(0);
        if ttl_seconds > 0 {
            if let Err(error) = self.cache.set_token(&context, ttl_seconds).await {
                warn!(region = %region, error = %error, "token cache write failed");
            }
        } else {
            debug!(region = %region, "issued token too short-lived to cache");
        }

        Ok(context)
    }
}
