use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadclaim_application::{ClaimResultRepository, RecordStatus};
use leadclaim_core::{AppError, AppResult, Region};
use leadclaim_domain::{ClaimResult, ClaimResultStatus, OpportunityId};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed claim result store.
#[derive(Clone)]
pub struct PostgresClaimResultRepository {
    pool: PgPool,
}

impl PostgresClaimResultRepository {
    /// Creates a claim result repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ClaimResultRow {
    opportunity_id: String,
    region: String,
    status: String,
    latency_ms: Option<i64>,
    response_excerpt: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl ClaimResultRow {
    fn into_result(self) -> AppResult<ClaimResult> {
        Ok(ClaimResult {
            opportunity_id: OpportunityId::new(self.opportunity_id)?,
            region: Region::new(self.region)?,
            status: ClaimResultStatus::parse(self.status.as_str())?,
            recorded_at: self.recorded_at,
            latency_ms: self.latency_ms,
            response_excerpt: self.response_excerpt,
        })
    }
}

#[async_trait]
impl ClaimResultRepository for PostgresClaimResultRepository {
    async fn insert_result(&self, result: ClaimResult) -> AppResult<RecordStatus> {
        // A success row is final; only failure rows are overwritten.
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO claim_results (
                opportunity_id,
                region,
                status,
                latency_ms,
                response_excerpt,
                recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (opportunity_id, region)
            DO UPDATE SET
                status = EXCLUDED.status,
                latency_ms = EXCLUDED.latency_ms,
                response_excerpt = EXCLUDED.response_excerpt,
                recorded_at = EXCLUDED.recorded_at
            WHERE claim_results.status <> 'success'
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(result.opportunity_id.as_str())
        .bind(result.region.as_str())
        .bind(result.status.as_storage())
        .bind(result.latency_ms)
        .bind(result.response_excerpt.as_deref())
        .bind(result.recorded_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!(
                "failed to record claim result for opportunity '{}' in region '{}': {error}",
                result.opportunity_id, result.region
            ))
        })?;

        Ok(match inserted {
            Some(true) => RecordStatus::Inserted,
            Some(false) => RecordStatus::Superseded,
            None => RecordStatus::Unchanged,
        })
    }

    async fn find_result(
        &self,
        opportunity_id: &OpportunityId,
        region: &Region,
    ) -> AppResult<Option<ClaimResult>> {
        sqlx::query_as::<_, ClaimResultRow>(
            r#"
            SELECT opportunity_id, region, status, latency_ms, response_excerpt, recorded_at
            FROM claim_results
            WHERE opportunity_id = $1
              AND region = $2
            "#,
        )
        .bind(opportunity_id.as_str())
        .bind(region.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!(
                "failed to load claim result for opportunity '{opportunity_id}': {error}"
            ))
        })?
        .map(ClaimResultRow::into_result)
        .transpose()
    }

    async fn list_recent(&self, limit: usize) -> AppResult<Vec<ClaimResult>> {
        let limit = i64::try_from(limit)
            .map_err(|error| AppError::Validation(format!("invalid result limit: {error}")))?;

        sqlx::query_as::<_, ClaimResultRow>(
            r#"
            SELECT opportunity_id, region, status, latency_ms, response_excerpt, recorded_at
            FROM claim_results
            ORDER BY recorded_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!("failed to list recent claim results: {error}"))
        })?
        .into_iter()
        .map(ClaimResultRow::into_result)
        .collect()
    }
}
