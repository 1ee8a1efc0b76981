use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use leadclaim_application::AuthTokenCache;
use leadclaim_core::{AppResult, AuthContext, Region};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct TokenCacheEntry {
    context: AuthContext,
    expires_at: Instant,
}

/// In-memory cache adapter for issued bearer tokens.
#[derive(Default)]
pub struct InMemoryAuthTokenCache {
    entries: RwLock<HashMap<Region, TokenCacheEntry>>,
}

impl InMemoryAuthTokenCache {
    /// Creates an empty in-memory token cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthTokenCache for InMemoryAuthTokenCache {
    async fn get_token(&self, region: &Region) -> AppResult<Option<AuthContext>> {
        {
            let entries = self.entries.read().await;
            match entries.get(region) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.context.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(region)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(region);
        }

        Ok(None)
    }

    async fn set_token(&self, context: &AuthContext, ttl_seconds: u32) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        self.entries.write().await.insert(
            context.region().clone(),
            TokenCacheEntry {
                context: context.clone(),
                expires_at,
            },
        );

        Ok(())
    }
}
