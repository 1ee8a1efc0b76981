use async_trait::async_trait;
use leadclaim_core::{AppResult, AuthContext, Region};

/// Issues bearer tokens per region.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns credentials for a region. Never returns an empty token.
    async fn fetch_token(&self, region: &Region) -> AppResult<AuthContext>;
}

/// Optional cache for issued tokens.
#[async_trait]
pub trait AuthTokenCache: Send + Sync {
    /// Returns the cached credentials for a region.
    async fn get_token(&self, region: &Region) -> AppResult<Option<AuthContext>>;

    /// Stores credentials with ttl.
    async fn set_token(&self, context: &AuthContext, ttl_seconds: u32) -> AppResult<()>;
}
