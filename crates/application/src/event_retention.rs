use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use leadclaim_core::{AppError, AppResult};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::claim_ports::PushEventLog;

/// Periodically deletes push events older than the retention window.
pub struct EventLogRetention {
    event_log: Arc<dyn PushEventLog>,
    retention: chrono::Duration,
    interval: Duration,
}

impl EventLogRetention {
    /// Creates a retention task keeping `retention_days` of events, purging hourly.
    pub fn new(event_log: Arc<dyn PushEventLog>, retention_days: i64) -> AppResult<Self> {
        if retention_days <= 0 {
            return Err(AppError::Validation(
                "event retention must be at least one day".to_owned(),
            ));
        }

        Ok(Self {
            event_log,
            retention: chrono::Duration::days(retention_days),
            interval: Duration::from_secs(60 * 60),
        })
    }

    /// Replaces the purge interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Deletes every event received before `now` minus the retention window.
    pub async fn purge_once(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let cutoff = now - self.retention;
        let purged = self.event_log.purge_older_than(cutoff).await?;
        if purged > 0 {
            info!(purged, cutoff = %cutoff, "push event log purged");
        }
        Ok(purged)
    }

    /// Purges on every interval tick until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            if let Err(error) = self.purge_once(Utc::now()).await {
                warn!(error = %error, "push event purge failed");
            }
        }

        info!("push event retention stopped");
    }
}
