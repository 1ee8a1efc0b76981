use chrono::{Duration, Utc};
use leadclaim_application::PushEventLog;
use leadclaim_core::Region;
use leadclaim_domain::{Lead, LeadEventKind, PushEventRecord};
use serde_json::json;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::PostgresPushEventLog;
use crate::MIGRATOR;

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres push event tests: {error}");
    }

    Some(pool)
}

fn unique_region(prefix: &str) -> Region {
    Region::new(format!("{prefix}-{}", uuid::Uuid::new_v4())).unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn payload_round_trips_through_jsonb() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let event_log = PostgresPushEventLog::new(pool);
    let region = unique_region("events");
    let payload = json!({"OpportunityId": "E1", "dealer": {"id": 88}, "tags": ["hot"]});
    let lead = Lead::from_payload(payload.clone(), &region).unwrap_or_else(|| unreachable!());

    assert!(
        event_log
            .append(PushEventRecord::for_lead(LeadEventKind::LeadAvailable, &lead))
            .await
            .is_ok()
    );

    let recent = event_log.list_recent(200).await.unwrap_or_default();
    let stored = recent.into_iter().find(|record| record.region == region);
    let Some(stored) = stored else {
        panic!("logged push event was not listed");
    };
    assert_eq!(stored.event_name, "LeadAvailable");
    assert_eq!(stored.payload, payload);
    assert_eq!(stored.opportunity_id.as_ref().map(|id| id.as_str()), Some("E1"));
}

#[tokio::test]
async fn purge_deletes_events_before_cutoff() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let event_log = PostgresPushEventLog::new(pool);
    let region = unique_region("purge");
    let mut stale = PushEventRecord::unresolved(LeadEventKind::Message, &region, json!({"n": 1}));
    stale.recorded_at = Utc::now() - Duration::days(30);
    let fresh = PushEventRecord::unresolved(LeadEventKind::Message, &region, json!({"n": 2}));
    assert!(event_log.append(stale).await.is_ok());
    assert!(event_log.append(fresh).await.is_ok());

    let purged = event_log
        .purge_older_than(Utc::now() - Duration::days(7))
        .await
        .unwrap_or_default();
    assert!(purged >= 1);

    let ours: Vec<_> = event_log
        .list_recent(200)
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|record| record.region == region)
        .map(|record| record.payload)
        .collect();
    assert_eq!(ours, vec![json!({"n": 2})]);
}
