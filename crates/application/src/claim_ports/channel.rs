use async_trait::async_trait;
use leadclaim_core::{AppResult, AuthContext};
use leadclaim_domain::PushEvent;
use serde_json::Value;

/// Remote pending-leads listing.
#[async_trait]
pub trait LeadListingSource: Send + Sync {
    /// Fetches the raw listing document.
    async fn fetch_listing(&self, auth: Option<&AuthContext>) -> AppResult<Value>;
}

/// Opens push-channel connections.
#[async_trait]
pub trait PushChannelConnector: Send + Sync {
    /// Connects and completes the protocol handshake.
    async fn connect(&self, auth: &AuthContext) -> AppResult<Box<dyn PushConnection>>;
}

/// One open push-channel connection.
#[async_trait]
pub trait PushConnection: Send {
    /// Waits for the next invocation. `Ok(None)` means the server closed the connection.
    async fn next_event(&mut self) -> AppResult<Option<PushEvent>>;
}
