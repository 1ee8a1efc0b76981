use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use leadclaim_application::{JobRepository, QueueStats};
use leadclaim_core::{AppError, AppResult};
use leadclaim_domain::{Job, JobId, JobPayload, JobStatus};
use tokio::sync::Mutex;

#[derive(Default)]
struct JobTable {
    jobs: HashMap<JobId, Job>,
    /// Ids still `queued`, in enqueue order. Claimed ids leave this queue.
    queued: VecDeque<JobId>,
}

/// In-memory claim job queue.
///
/// Dequeue reads and transitions under one lock, which gives per-process exclusivity only.
#[derive(Default)]
pub struct InMemoryJobRepository {
    table: Mutex<JobTable>,
}

impl InMemoryJobRepository {
    /// Creates an empty in-memory queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn enqueue(&self, payload: JobPayload) -> AppResult<JobId> {
        let job = Job::queued(payload);
        let job_id = job.id;
        let mut table = self.table.lock().await;
        table.queued.push_back(job_id);
        table.jobs.insert(job_id, job);
        Ok(job_id)
    }

    async fn claim_batch(&self, limit: usize) -> AppResult<Vec<Job>> {
        let mut table = self.table.lock().await;
        let JobTable { jobs, queued } = &mut *table;

        let mut claimed = Vec::with_capacity(limit.min(queued.len()));
        while claimed.len() < limit {
            let Some(job_id) = queued.pop_front() else {
                break;
            };
            let Some(job) = jobs.get_mut(&job_id) else {
                continue;
            };

            job.transition_to(JobStatus::Processing)?;
            claimed.push(job.clone());
        }

        Ok(claimed)
    }

    async fn mark_done(&self, job_id: JobId) -> AppResult<()> {
        let mut table = self.table.lock().await;
        let job = table
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("claim job '{job_id}' does not exist")))?;
        job.transition_to(JobStatus::Done)
    }

    async fn find_job(&self, job_id: JobId) -> AppResult<Option<Job>> {
        Ok(self.table.lock().await.jobs.get(&job_id).cloned())
    }

    async fn queue_stats(&self) -> AppResult<QueueStats> {
        let table = self.table.lock().await;
        let mut stats = QueueStats::default();
        for job in table.jobs.values() {
            match job.status {
                JobStatus::Queued => stats.queued_jobs += 1,
                JobStatus::Processing => stats.processing_jobs += 1,
                JobStatus::Done => stats.done_jobs += 1,
            }
        }

        Ok(stats)
    }
}
