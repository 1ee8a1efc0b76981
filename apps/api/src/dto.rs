use chrono::{DateTime, Utc};
use leadclaim_application::QueueStats;
use leadclaim_domain::{ClaimResult, PushEventRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct QueueStatsResponse {
    pub queued_jobs: u64,
    pub processing_jobs: u64,
    pub done_jobs: u64,
}

impl From<QueueStats> for QueueStatsResponse {
    fn from(value: QueueStats) -> Self {
        Self {
            queued_jobs: value.queued_jobs,
            processing_jobs: value.processing_jobs,
            done_jobs: value.done_jobs,
        }
    }
}

const DEFAULT_RECENT_LIMIT: usize = 20;
const MAX_RECENT_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

impl RecentQuery {
    /// Requested row count, defaulted and clamped to `1..=200`.
    pub fn bounded_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT)
    }
}

/// One stored claim outcome.
#[derive(Debug, Serialize)]
pub struct ClaimResultResponse {
    pub opportunity_id: String,
    pub region: String,
    pub status: String,
    pub recorded_at: DateTime<Utc>,
    pub latency_ms: Option<i64>,
    pub response_excerpt: Option<String>,
}

impl From<ClaimResult> for ClaimResultResponse {
    fn from(value: ClaimResult) -> Self {
        Self {
            opportunity_id: value.opportunity_id.as_str().to_owned(),
            region: value.region.as_str().to_owned(),
            status: value.status.as_storage(),
            recorded_at: value.recorded_at,
            latency_ms: value.latency_ms,
            response_excerpt: value.response_excerpt,
        }
    }
}

/// One logged push event.
#[derive(Debug, Serialize)]
pub struct PushEventResponse {
    pub event_name: String,
    pub region: String,
    pub opportunity_id: Option<String>,
    pub payload: Value,
    pub recorded_at: DateTime<Utc>,
}

impl From<PushEventRecord> for PushEventResponse {
    fn from(value: PushEventRecord) -> Self {
        Self {
            event_name: value.event_name,
            region: value.region.as_str().to_owned(),
            opportunity_id: value.opportunity_id.map(|id| id.as_str().to_owned()),
            payload: value.payload,
            recorded_at: value.recorded_at,
        }
    }
}
