use std::collections::HashMap;

use async_trait::async_trait;
use leadclaim_application::{ClaimResultRepository, RecordStatus};
use leadclaim_core::{AppResult, Region};
use leadclaim_domain::{ClaimResult, OpportunityId};
use tokio::sync::RwLock;

type ResultKey = (OpportunityId, Region);

/// In-memory claim result store enforcing the same uniqueness rules as Postgres.
#[derive(Default)]
pub struct InMemoryClaimResultRepository {
    results: RwLock<HashMap<ResultKey, ClaimResult>>,
}

impl InMemoryClaimResultRepository {
    /// Creates an empty result store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimResultRepository for InMemoryClaimResultRepository {
    async fn insert_result(&self, result: ClaimResult) -> AppResult<RecordStatus> {
        let key = (result.opportunity_id.clone(), result.region.clone());
        let mut results = self.results.write().await;

        let status = match results.get(&key) {
            None => RecordStatus::Inserted,
            Some(existing) if existing.status.is_success() => return Ok(RecordStatus::Unchanged),
            Some(_) => RecordStatus::Superseded,
        };
        results.insert(key, result);

        Ok(status)
    }

    async fn find_result(
        &self,
        opportunity_id: &OpportunityId,
        region: &Region,
    ) -> AppResult<Option<ClaimResult>> {
        Ok(self
            .results
            .read()
            .await
            .get(&(opportunity_id.clone(), region.clone()))
            .cloned())
    }

    async fn list_recent(&self, limit: usize) -> AppResult<Vec<ClaimResult>> {
        let mut results: Vec<ClaimResult> = self.results.read().await.values().cloned().collect();
        results.sort_by(|left, right| right.recorded_at.cmp(&left.recorded_at));
        results.truncate(limit);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use leadclaim_application::{ClaimResultRepository, RecordStatus};
    use leadclaim_core::Region;
    use leadclaim_domain::{ClaimResult, ClaimResultStatus, OpportunityId};

    use super::InMemoryClaimResultRepository;

    fn result(id: &str, code: u16, minutes_ago: i64) -> ClaimResult {
        ClaimResult {
            opportunity_id: OpportunityId::new(id).unwrap_or_else(|_| unreachable!()),
            region: Region::new("Central FL").unwrap_or_else(|_| unreachable!()),
            status: ClaimResultStatus::from_code(code),
            recorded_at: Utc::now() - Duration::minutes(minutes_ago),
            latency_ms: None,
            response_excerpt: None,
        }
    }

    #[tokio::test]
    async fn concurrent_successes_leave_one_row() {
        let repository = std::sync::Arc::new(InMemoryClaimResultRepository::new());
        let mut handles = Vec::new();
        for code in [200, 201, 204, 200] {
            let repository = repository.clone();
            handles.push(tokio::spawn(async move {
                repository.insert_result(result("A1", code, 0)).await
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if let Ok(Ok(RecordStatus::Inserted)) = handle.await {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(repository.list_recent(10).await.map(|rows| rows.len()).ok(), Some(1));
    }

    #[tokio::test]
    async fn recent_results_are_newest_first_and_limited() {
        let repository = InMemoryClaimResultRepository::new();
        assert!(repository.insert_result(result("old", 200, 10)).await.is_ok());
        assert!(repository.insert_result(result("new", 403, 1)).await.is_ok());
        assert!(repository.insert_result(result("mid", 0, 5)).await.is_ok());

        let recent = repository.list_recent(2).await.unwrap_or_default();
        let ids: Vec<&str> = recent
            .iter()
            .map(|stored| stored.opportunity_id.as_str())
            .collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }
}
