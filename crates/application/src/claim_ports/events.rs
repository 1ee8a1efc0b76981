use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadclaim_core::AppResult;
use leadclaim_domain::PushEventRecord;

/// Append-only log of received push events.
#[async_trait]
pub trait PushEventLog: Send + Sync {
    /// Stores one received event.
    async fn append(&self, record: PushEventRecord) -> AppResult<()>;

    /// Lists the most recently received events, newest first.
    async fn list_recent(&self, limit: usize) -> AppResult<Vec<PushEventRecord>>;

    /// Deletes events received before `cutoff` and returns how many were removed.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
