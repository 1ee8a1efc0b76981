use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadclaim_application::PushEventLog;
use leadclaim_core::AppResult;
use leadclaim_domain::PushEventRecord;
use tokio::sync::RwLock;

/// In-memory push event log for local runs without a database.
#[derive(Default)]
pub struct InMemoryPushEventLog {
    records: RwLock<Vec<PushEventRecord>>,
}

impl InMemoryPushEventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PushEventLog for InMemoryPushEventLog {
    async fn append(&self, record: PushEventRecord) -> AppResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> AppResult<Vec<PushEventRecord>> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|left, right| right.recorded_at.cmp(&left.recorded_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| record.recorded_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}
