use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Duration, Utc};

use crate::Region;

/// Bearer credentials for one region, obtained from the token service.
///
/// The token is never persisted; callers fetch a fresh context per claim
/// attempt unless a cache is layered in front of the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    region: Region,
    bearer_token: String,
    expires_at: DateTime<Utc>,
}

impl AuthContext {
    /// Creates an auth context for one region.
    #[must_use]
    pub fn new(region: Region, bearer_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            region,
            bearer_token: bearer_token.into(),
            expires_at,
        }
    }

    /// Returns the region the token was issued for.
    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Returns the raw bearer token.
    #[must_use]
    pub fn bearer_token(&self) -> &str {
        self.bearer_token.as_str()
    }

    /// Returns the token expiry instant.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the `Authorization` header value.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.bearer_token)
    }

    /// Returns whether the token is expired, or will be within `skew`, at `now`.
    #[must_use]
    pub fn is_expiring(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expires_at <= now + skew
    }
}

impl Debug for AuthContext {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AuthContext")
            .field("region", &self.region)
            .field("bearer_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
