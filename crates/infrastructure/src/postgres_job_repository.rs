use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadclaim_application::{JobRepository, QueueStats};
use leadclaim_core::{AppError, AppResult, Region};
use leadclaim_domain::{Job, JobId, JobPayload, JobStatus, OpportunityId};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed claim job queue.
///
/// Dequeue is a single conditional `UPDATE` over `FOR UPDATE SKIP LOCKED` candidates, so a job
/// is handed out once even when several processes share the table.
#[derive(Clone)]
pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    /// Creates a job repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ClaimJobRow {
    id: uuid::Uuid,
    opportunity_id: String,
    region: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl ClaimJobRow {
    fn into_job(self) -> AppResult<Job> {
        Ok(Job {
            id: JobId::from_uuid(self.id),
            payload: JobPayload {
                opportunity_id: OpportunityId::new(self.opportunity_id)?,
                region: Region::new(self.region)?,
            },
            status: JobStatus::parse(self.status.as_str())?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct QueueStatsRow {
    queued_jobs: i64,
    processing_jobs: i64,
    done_jobs: i64,
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    async fn enqueue(&self, payload: JobPayload) -> AppResult<JobId> {
        let job = Job::queued(payload);

        sqlx::query(
            r#"
            INSERT INTO claim_jobs (
                id,
                opportunity_id,
                region,
                status,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $5)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.payload.opportunity_id.as_str())
        .bind(job.payload.region.as_str())
        .bind(job.status.as_str())
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!(
                "failed to enqueue claim job for opportunity '{}': {error}",
                job.payload.opportunity_id
            ))
        })?;

        Ok(job.id)
    }

    async fn claim_batch(&self, limit: usize) -> AppResult<Vec<Job>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let limit = i64::try_from(limit)
            .map_err(|error| AppError::Validation(format!("invalid claim limit: {error}")))?;

        let rows = sqlx::query_as::<_, ClaimJobRow>(
            r#"
            UPDATE claim_jobs
            SET status = 'processing', updated_at = now()
            WHERE id IN (
                SELECT id
                FROM claim_jobs
                WHERE status = 'queued'
                ORDER BY created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
              AND status = 'queued'
            RETURNING id, opportunity_id, region, status, created_at
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to claim queued jobs: {error}")))?;

        let mut jobs = rows
            .into_iter()
            .map(ClaimJobRow::into_job)
            .collect::<AppResult<Vec<_>>>()?;
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn mark_done(&self, job_id: JobId) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE claim_jobs
            SET status = 'done', updated_at = now()
            WHERE id = $1
              AND status <> 'done'
            "#,
        )
        .bind(job_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!("failed to mark claim job '{job_id}' done: {error}"))
        })?;

        if result.rows_affected() == 0 && self.find_job(job_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "claim job '{job_id}' does not exist"
            )));
        }

        Ok(())
    }

    async fn find_job(&self, job_id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, ClaimJobRow>(
            r#"
            SELECT id, opportunity_id, region, status, created_at
            FROM claim_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!("failed to load claim job '{job_id}': {error}"))
        })?
        .map(ClaimJobRow::into_job)
        .transpose()
    }

    async fn queue_stats(&self) -> AppResult<QueueStats> {
        let row = sqlx::query_as::<_, QueueStatsRow>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'queued') AS queued_jobs,
                COUNT(*) FILTER (WHERE status = 'processing') AS processing_jobs,
                COUNT(*) FILTER (WHERE status = 'done') AS done_jobs
            FROM claim_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to load queue stats: {error}")))?;

        Ok(QueueStats {
            queued_jobs: u64::try_from(row.queued_jobs).unwrap_or_default(),
            processing_jobs: u64::try_from(row.processing_jobs).unwrap_or_default(),
            done_jobs: u64::try_from(row.done_jobs).unwrap_or_default(),
        })
    }
}
