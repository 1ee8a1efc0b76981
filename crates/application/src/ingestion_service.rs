use std::sync::Arc;
use std::time::Duration;

use leadclaim_core::{AppResult, Region};
use leadclaim_domain::{JobId, JobPayload, Lead, extract_listing_items};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::claim_ports::{JobRepository, LeadListingSource, TokenProvider};

/// Turns normalized leads into queued claim jobs.
#[derive(Clone)]
pub struct IngestionService {
    jobs: Arc<dyn JobRepository>,
}

impl IngestionService {
    /// Creates an ingestion service.
    #[must_use]
    pub fn new(jobs: Arc<dyn JobRepository>) -> Self {
        Self { jobs }
    }

    /// Enqueues one job for a lead.
    pub async fn enqueue_lead(&self, lead: &Lead, source: &'static str) -> AppResult<JobId> {
        let job_id = self
            .jobs
            .enqueue(JobPayload {
                opportunity_id: lead.opportunity_id.clone(),
                region: lead.region.clone(),
            })
            .await?;

        debug!(
            job_id = %job_id,
            opportunity_id = %lead.opportunity_id,
            region = %lead.region,
            source,
            "claim job enqueued"
        );

        Ok(job_id)
    }
}

/// Result of one polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The listing was empty.
    Heartbeat,
    /// The listing had items.
    Enqueued {
        /// Jobs created.
        enqueued: usize,
        /// Items without a resolvable identifier, or whose enqueue failed.
        skipped: usize,
    },
}

/// Periodically submits every pending lead reported by the listing endpoint.
///
/// No memory of earlier cycles is kept, so a lead still pending upstream is enqueued again on
/// every cycle.
#[derive(Clone)]
pub struct LeadPoller {
    source: Arc<dyn LeadListingSource>,
    ingestion: IngestionService,
    tokens: Option<Arc<dyn TokenProvider>>,
    region: Region,
    interval: Duration,
}

impl LeadPoller {
    /// Creates a poller for one region.
    #[must_use]
    pub fn new(
        source: Arc<dyn LeadListingSource>,
        ingestion: IngestionService,
        region: Region,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            ingestion,
            tokens: None,
            region,
            interval,
        }
    }

    /// Sends a bearer token with every listing request.
    #[must_use]
    pub fn with_bearer(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Runs one polling cycle.
    pub async fn poll_once(&self) -> AppResult<PollOutcome> {
        let auth = match &self.tokens {
            Some(tokens) => Some(tokens.fetch_token(&self.region).await?),
            None => None,
        };

        let listing = self.source.fetch_listing(auth.as_ref()).await?;
        let items = extract_listing_items(&listing)?;

        if items.is_empty() {
            info!(region = %self.region, "heartbeat: no pending leads");
            return Ok(PollOutcome::Heartbeat);
        }

        let mut enqueued = 0_usize;
        let mut skipped = 0_usize;
        for item in items {
            let Some(lead) = Lead::from_payload(item.clone(), &self.region) else {
                skipped += 1;
                continue;
            };

            match self.ingestion.enqueue_lead(&lead, "poller").await {
                Ok(_) => enqueued += 1,
                Err(error) => {
                    skipped += 1;
                    warn!(
                        opportunity_id = %lead.opportunity_id,
                        region = %self.region,
                        error = %error,
                        "failed to enqueue polled lead"
                    );
                }
            }
        }

        info!(
            region = %self.region,
            enqueued,
            skipped,
            "polling cycle finished"
        );

        Ok(PollOutcome::Enqueued { enqueued, skipped })
    }

    /// Polls on a fixed interval until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            if let Err(error) = self.poll_once().await {
                warn!(region = %self.region, error = %error, "polling cycle failed");
            }
        }

        info!(region = %self.region, "poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use leadclaim_core::AppError;
    use serde_json::json;

    use super::{IngestionService, LeadPoller, PollOutcome};
    use crate::claim_ports::JobRepository;
    use crate::test_support::{FakeJobRepository, FakeListingSource, FakeTokenProvider, region};

    fn poller(jobs: Arc<FakeJobRepository>, listing: serde_json::Value) -> LeadPoller {
        LeadPoller::new(
            Arc::new(FakeListingSource::returning(listing)),
            IngestionService::new(jobs),
            region(),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn paged_results_enqueue_one_job() {
        let jobs = Arc::new(FakeJobRepository::default());
        let poller = poller(jobs.clone(), json!({"pagedResults": [{"opportunityId": "A1"}]}));

        let outcome = poller.poll_once().await;

        assert_eq!(
            outcome.ok(),
            Some(PollOutcome::Enqueued {
                enqueued: 1,
                skipped: 0
            })
        );
        let queued = jobs.claim_batch(10).await.unwrap_or_default();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].payload.opportunity_id.as_str(), "A1");
        assert_eq!(queued[0].payload.region, region());
    }

    #[tokio::test]
    async fn empty_listing_is_a_heartbeat() {
        let jobs = Arc::new(FakeJobRepository::default());
        let poller = poller(jobs.clone(), json!([]));

        assert_eq!(poller.poll_once().await.ok(), Some(PollOutcome::Heartbeat));
        assert_eq!(jobs.queue_stats().await.map(|stats| stats.queued_jobs).ok(), Some(0));
    }

    #[tokio::test]
    async fn leads_without_identifier_are_counted_not_enqueued() {
        let jobs = Arc::new(FakeJobRepository::default());
        let poller = poller(
            jobs.clone(),
            json!({"data": [{"id": "B1"}, {"name": "no id"}, {"id": ""}]}),
        );

        assert_eq!(
            poller.poll_once().await.ok(),
            Some(PollOutcome::Enqueued {
                enqueued: 1,
                skipped: 2
            })
        );
    }

    #[tokio::test]
    async fn every_cycle_resubmits_pending_leads() {
        let jobs = Arc::new(FakeJobRepository::default());
        let poller = poller(jobs.clone(), json!([{"id": "C1"}]));

        assert!(poller.poll_once().await.is_ok());
        assert!(poller.poll_once().await.is_ok());

        assert_eq!(jobs.queue_stats().await.map(|stats| stats.queued_jobs).ok(), Some(2));
    }

    #[tokio::test]
    async fn unrecognized_listing_is_a_validation_error() {
        let jobs = Arc::new(FakeJobRepository::default());
        let poller = poller(jobs, json!({"results": []}));

        assert!(matches!(
            poller.poll_once().await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn bearer_token_is_sent_when_configured() {
        let jobs = Arc::new(FakeJobRepository::default());
        let source = Arc::new(FakeListingSource::returning(json!([])));
        let poller = LeadPoller::new(
            source.clone(),
            IngestionService::new(jobs),
            region(),
            Duration::from_secs(30),
        )
        .with_bearer(Arc::new(FakeTokenProvider::default()));

        assert!(poller.poll_once().await.is_ok());
        assert_eq!(source.bearer_tokens().await, vec![Some("token-1".to_owned())]);
    }
}
