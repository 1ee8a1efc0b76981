use async_trait::async_trait;
use leadclaim_core::AppResult;
use leadclaim_domain::{Job, JobId, JobPayload};

/// Aggregate job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs waiting for a worker.
    pub queued_jobs: u64,
    /// Jobs currently in flight.
    pub processing_jobs: u64,
    /// Finished jobs, regardless of claim outcome.
    pub done_jobs: u64,
}

/// Persistent claim job queue.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Inserts one job in `queued` state. Payloads are not deduplicated.
    async fn enqueue(&self, payload: JobPayload) -> AppResult<JobId>;

    /// Moves up to `limit` queued jobs to `processing` and returns them.
    ///
    /// A job returned by one call is never returned by a concurrent call in the same process.
    async fn claim_batch(&self, limit: usize) -> AppResult<Vec<Job>>;

    /// Moves one job to `done`. Completing an already finished job is a no-op.
    async fn mark_done(&self, job_id: JobId) -> AppResult<()>;

    /// Returns one job by id.
    async fn find_job(&self, job_id: JobId) -> AppResult<Option<Job>>;

    /// Returns job counts by status.
    async fn queue_stats(&self) -> AppResult<QueueStats>;
}
