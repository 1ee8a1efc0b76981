use async_trait::async_trait;
use leadclaim_core::AuthContext;
use leadclaim_domain::{ClaimAttempt, OpportunityId};

/// Remote claim protocol.
///
/// Implementations never fail: transport errors are reported as code `0`.
#[async_trait]
pub trait ClaimStrategy: Send + Sync {
    /// Attempts to claim one opportunity with the given credentials.
    async fn claim(
        &self,
        opportunity_id: &OpportunityId,
        auth: &AuthContext,
        dealer_id: Option<i64>,
    ) -> ClaimAttempt;
}
