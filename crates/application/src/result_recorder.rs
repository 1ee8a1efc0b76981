use std::sync::Arc;

use leadclaim_core::Region;
use leadclaim_domain::{ClaimAttempt, ClaimResult, OpportunityId};
use tracing::{debug, warn};

use crate::claim_ports::{ClaimResultRepository, RecordStatus};

/// Best-effort writer for claim outcomes.
///
/// Store failures are logged and reported as [`RecordStatus::Dropped`]; they never reach the
/// claim flow as errors.
#[derive(Clone)]
pub struct ResultRecorder {
    repository: Arc<dyn ClaimResultRepository>,
}

impl ResultRecorder {
    /// Creates a recorder over a result store.
    #[must_use]
    pub fn new(repository: Arc<dyn ClaimResultRepository>) -> Self {
        Self { repository }
    }

    /// Records the outcome of one claim attempt.
    pub async fn record(
        &self,
        opportunity_id: &OpportunityId,
        region: &Region,
        attempt: &ClaimAttempt,
    ) -> RecordStatus {
        let result = ClaimResult::from_attempt(opportunity_id.clone(), region.clone(), attempt);
        let status_value = result.status.as_storage();

        match self.repository.insert_result(result).await {
            Ok(status) => {
                debug!(
                    opportunity_id = %opportunity_id,
                    region = %region,
                    status = %status_value,
                    record_status = status.as_str(),
                    "claim result recorded"
                );
                status
            }
            Err(error) => {
                warn!(
                    opportunity_id = %opportunity_id,
                    region = %region,
                    status = %status_value,
                    error = %error,
                    "claim result write dropped"
                );
                RecordStatus::Dropped(error.to_string())
            }
        }
    }
}
