use std::collections::HashMap;
use std::sync::Arc;

use leadclaim_core::{AppResult, AuthContext, Region};
use leadclaim_domain::{ClaimAttempt, Job, OpportunityId};
use tracing::{info, warn};

use crate::claim_ports::{ClaimStrategy, JobRepository, TokenProvider};
use crate::result_recorder::ResultRecorder;

/// Final state of one processed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The claim was won.
    Claimed(ClaimAttempt),
    /// The claim was attempted and lost or errored.
    Rejected(ClaimAttempt),
    /// Credentials could not be obtained; no claim was attempted.
    AuthFailed(String),
}

impl JobOutcome {
    /// Returns whether the claim was won.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }
}

/// Runs the token, claim and record steps for one lead.
#[derive(Clone)]
pub struct ClaimDispatchService {
    tokens: Arc<dyn TokenProvider>,
    strategy: Arc<dyn ClaimStrategy>,
    recorder: ResultRecorder,
    jobs: Arc<dyn JobRepository>,
    dealer_ids: HashMap<Region, i64>,
}

impl ClaimDispatchService {
    /// Creates a dispatch service.
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        strategy: Arc<dyn ClaimStrategy>,
        recorder: ResultRecorder,
        jobs: Arc<dyn JobRepository>,
    ) -> Self {
        Self {
            tokens,
            strategy,
            recorder,
            jobs,
            dealer_ids: HashMap::new(),
        }
    }

    /// Adds the dealer identifier sent with secondary-endpoint claims for a region.
    #[must_use]
    pub fn with_dealer_id(mut self, region: Region, dealer_id: i64) -> Self {
        self.dealer_ids.insert(region, dealer_id);
        self
    }

    /// Fetches fresh credentials, claims, and records the outcome.
    ///
    /// Only a token failure is returned as an error; claim failures are part of the attempt.
    pub async fn claim_now(
        &self,
        opportunity_id: &OpportunityId,
        region: &Region,
    ) -> AppResult<ClaimAttempt> {
        let auth = self.tokens.fetch_token(region).await?;
        Ok(self.claim_with_auth(opportunity_id, &auth).await)
    }

    /// Claims with existing credentials and records the outcome.
    pub async fn claim_with_auth(
        &self,
        opportunity_id: &OpportunityId,
        auth: &AuthContext,
    ) -> ClaimAttempt {
        let region = auth.region();
        let dealer_id = self.dealer_ids.get(region).copied();
        let attempt = self.strategy.claim(opportunity_id, auth, dealer_id).await;

        if attempt.is_success() {
            info!(
                opportunity_id = %opportunity_id,
                region = %region,
                status_code = attempt.code,
                endpoint = attempt.endpoint.as_str(),
                latency_ms = attempt.latency_ms,
                "claim succeeded"
            );
        } else {
            warn!(
                opportunity_id = %opportunity_id,
                region = %region,
                status_code = attempt.code,
                endpoint = attempt.endpoint.as_str(),
                latency_ms = attempt.latency_ms,
                "claim failed"
            );
        }

        self.recorder.record(opportunity_id, region, &attempt).await;
        attempt
    }

    /// Processes one dequeued job and always marks it done.
    pub async fn process_job(&self, job: Job) -> JobOutcome {
        let payload = &job.payload;
        let outcome = match self
            .claim_now(&payload.opportunity_id, &payload.region)
            .await
        {
            Ok(attempt) if attempt.is_success() => JobOutcome::Claimed(attempt),
            Ok(attempt) => JobOutcome::Rejected(attempt),
            Err(error) => {
                warn!(
                    job_id = %job.id,
                    opportunity_id = %payload.opportunity_id,
                    region = %payload.region,
                    error = %error,
                    "token fetch failed; job abandoned"
                );
                JobOutcome::AuthFailed(error.to_string())
            }
        };

        if let Err(error) = self.jobs.mark_done(job.id).await {
            warn!(job_id = %job.id, error = %error, "failed to mark job done");
        }

        outcome
    }
}
