use std::sync::Arc;
use std::time::Duration;

use leadclaim_core::{AppError, AppResult};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::claim_dispatch_service::{ClaimDispatchService, JobOutcome};
use crate::claim_ports::JobRepository;

/// Worker pool timing and sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolSettings {
    /// Maximum number of jobs processed concurrently.
    pub max_parallel: usize,
    /// Pause after an empty dequeue.
    pub idle_interval: Duration,
    /// Pause after a job store error.
    pub store_retry_interval: Duration,
}

impl Default for WorkerPoolSettings {
    fn default() -> Self {
        Self {
            max_parallel: 5,
            idle_interval: Duration::from_secs(1),
            store_retry_interval: Duration::from_secs(2),
        }
    }
}

/// Totals reported when the pool stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    /// Jobs handed to a worker slot.
    pub dispatched: u64,
    /// Jobs whose claim was won.
    pub succeeded: u64,
    /// Jobs whose claim was lost, errored, or never attempted.
    pub failed: u64,
}

impl PoolSummary {
    fn observe(&mut self, outcome: &JobOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Bounded pool draining the job store.
///
/// A job is only moved to `processing` once a worker slot is reserved for it.
pub struct WorkerPool {
    jobs: Arc<dyn JobRepository>,
    dispatcher: Arc<ClaimDispatchService>,
    settings: WorkerPoolSettings,
    slots: Arc<Semaphore>,
    in_flight: JoinSet<JobOutcome>,
    summary: PoolSummary,
}

impl WorkerPool {
    /// Creates a worker pool.
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        dispatcher: Arc<ClaimDispatchService>,
        settings: WorkerPoolSettings,
    ) -> AppResult<Self> {
        if settings.max_parallel == 0 {
            return Err(AppError::Validation(
                "max_parallel must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            jobs,
            dispatcher,
            settings,
            slots: Arc::new(Semaphore::new(settings.max_parallel)),
            in_flight: JoinSet::new(),
            summary: PoolSummary::default(),
        })
    }

    /// Returns totals for jobs finished so far.
    #[must_use]
    pub fn summary(&self) -> PoolSummary {
        self.summary
    }

    /// Waits for a free slot, dequeues a batch sized to the free slots, and spawns it.
    ///
    /// Returns the number of jobs dispatched.
    pub async fn dispatch_once(&mut self) -> AppResult<usize> {
        let first = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|error| AppError::Internal(format!("worker slots closed: {error}")))?;
        self.dispatch_with(first).await
    }

    async fn dispatch_with(&mut self, first: OwnedSemaphorePermit) -> AppResult<usize> {
        let mut permits = vec![first];
        while permits.len() < self.settings.max_parallel {
            match self.slots.clone().try_acquire_owned() {
                Ok(permit) => permits.push(permit),
                Err(_) => break,
            }
        }

        let batch = self.jobs.claim_batch(permits.len()).await?;
        let dispatched = batch.len();

        for (job, permit) in batch.into_iter().zip(permits) {
            let dispatcher = self.dispatcher.clone();
            self.in_flight.spawn(async move {
                let outcome = dispatcher.process_job(job).await;
                drop(permit);
                outcome
            });
        }

        self.summary.dispatched += dispatched as u64;
        Ok(dispatched)
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            self.observe_joined(joined);
        }
    }

    fn observe_joined(&mut self, joined: Result<JobOutcome, tokio::task::JoinError>) {
        match joined {
            Ok(outcome) => self.summary.observe(&outcome),
            Err(error) => {
                self.summary.failed += 1;
                warn!(error = %error, "claim worker task aborted");
            }
        }
    }

    /// Waits for every in-flight job to finish.
    pub async fn drain(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            self.observe_joined(joined);
        }
    }

    /// Runs the dispatch loop until shutdown is signalled, then drains in-flight jobs.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> PoolSummary {
        info!(
            max_parallel = self.settings.max_parallel,
            idle_interval_ms = self.settings.idle_interval.as_millis() as u64,
            "worker pool started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let first = tokio::select! {
                _ = shutdown.changed() => break,
                permit = self.slots.clone().acquire_owned() => permit,
            };
            let Ok(first) = first else {
                warn!("worker slots closed");
                break;
            };

            let pause = match self.dispatch_with(first).await {
                Ok(0) => Some(self.settings.idle_interval),
                Ok(_) => None,
                Err(error) => {
                    warn!(error = %error, "job store unavailable; backing off");
                    Some(self.settings.store_retry_interval)
                }
            };
            self.reap_finished();

            if let Some(pause) = pause {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    () = tokio::time::sleep(pause) => {}
                }
            }
        }

        info!(in_flight = self.in_flight.len(), "worker pool draining");
        self.drain().await;

        let summary = self.summary;
        info!(
            dispatched = summary.dispatched,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "worker pool stopped"
        );
        summary
    }
}
