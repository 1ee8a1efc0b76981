use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadclaim_application::PushEventLog;
use leadclaim_core::{AppError, AppResult, Region};
use leadclaim_domain::{OpportunityId, PushEventRecord};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed push event log. Payloads are stored as JSONB.
#[derive(Clone)]
pub struct PostgresPushEventLog {
    pool: PgPool,
}

impl PostgresPushEventLog {
    /// Creates an event log with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PushEventRow {
    event_name: String,
    region: String,
    opportunity_id: Option<String>,
    payload: String,
    recorded_at: DateTime<Utc>,
}

impl PushEventRow {
    fn into_record(self) -> AppResult<PushEventRecord> {
        let payload = serde_json::from_str(self.payload.as_str()).map_err(|error| {
            AppError::Internal(format!("stored push event payload is not JSON: {error}"))
        })?;

        Ok(PushEventRecord {
            event_name: self.event_name,
            region: Region::new(self.region)?,
            opportunity_id: self.opportunity_id.map(OpportunityId::new).transpose()?,
            payload,
            recorded_at: self.recorded_at,
        })
    }
}

#[async_trait]
impl PushEventLog for PostgresPushEventLog {
    async fn append(&self, record: PushEventRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO push_events (event_name, region, opportunity_id, payload, recorded_at)
            VALUES ($1, $2, $3, $4::jsonb, $5)
            "#,
        )
        .bind(record.event_name.as_str())
        .bind(record.region.as_str())
        .bind(record.opportunity_id.as_ref().map(|id| id.as_str()))
        .bind(record.payload.to_string())
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!(
                "failed to log push event '{}' in region '{}': {error}",
                record.event_name, record.region
            ))
        })?;

        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> AppResult<Vec<PushEventRecord>> {
        let limit = i64::try_from(limit)
            .map_err(|error| AppError::Validation(format!("invalid event limit: {error}")))?;

        sqlx::query_as::<_, PushEventRow>(
            r#"
            SELECT event_name, region, opportunity_id, payload::text AS payload, recorded_at
            FROM push_events
            ORDER BY recorded_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to list push events: {error}")))?
        .into_iter()
        .map(PushEventRow::into_record)
        .collect()
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM push_events
            WHERE recorded_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to purge push events: {error}")))?;

        Ok(deleted.rows_affected())
    }
}

#[cfg(test)]
mod tests;
