use std::sync::Arc;
use std::time::Duration;

use leadclaim_core::{AppResult, Region};
use leadclaim_domain::{
    ClaimAttempt, JobId, Lead, PushEvent, PushEventRecord, extract_opportunity_id,
};
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

use crate::claim_dispatch_service::ClaimDispatchService;
use crate::claim_ports::{PushChannelConnector, PushEventLog, TokenProvider};
use crate::ingestion_service::IngestionService;

/// Bounded exponential backoff for push-channel reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed connects tolerated before giving up.
    pub max_attempts: u32,
    /// Delay before the first reconnect.
    pub initial_backoff: Duration,
    /// Upper bound for any delay.
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Returns the delay before reconnect number `attempt` (1-based), or `None` to give up.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        let factor = 2_u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
        let delay = self
            .initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff);
        Some(delay.min(self.max_backoff))
    }
}

/// What the listener did with one push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerAction {
    /// The event name is not one the listener handles.
    Ignored,
    /// The payload had no resolvable opportunity identifier.
    MissingIdentifier,
    /// A job was queued.
    Enqueued(JobId),
    /// The claim was attempted directly.
    Claimed(ClaimAttempt),
    /// Neither a claim nor an enqueue could be performed.
    Dropped(String),
}

/// Number of events handled concurrently unless configured otherwise.
const DEFAULT_MAX_IN_FLIGHT: usize = 5;

/// Push-channel ingestion with optional direct claiming.
///
/// Events are handled on spawned tasks so a slow claim never stalls the read loop.
/// At most `max_in_flight` events are handled at once; the rest wait for a slot.
#[derive(Clone)]
pub struct LiveListener {
    connector: Arc<dyn PushChannelConnector>,
    tokens: Arc<dyn TokenProvider>,
    region: Region,
    ingestion: IngestionService,
    auto_claim: Option<Arc<ClaimDispatchService>>,
    event_log: Option<Arc<dyn PushEventLog>>,
    reconnect: ReconnectPolicy,
    handler_slots: Arc<Semaphore>,
}

impl LiveListener {
    /// Creates a listener that enqueues every matching event.
    #[must_use]
    pub fn new(
        connector: Arc<dyn PushChannelConnector>,
        tokens: Arc<dyn TokenProvider>,
        region: Region,
        ingestion: IngestionService,
    ) -> Self {
        Self {
            connector,
            tokens,
            region,
            ingestion,
            auto_claim: None,
            event_log: None,
            reconnect: ReconnectPolicy::default(),
            handler_slots: Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT)),
        }
    }

    /// Claims directly instead of enqueueing.
    #[must_use]
    pub fn with_auto_claim(mut self, dispatcher: Arc<ClaimDispatchService>) -> Self {
        self.auto_claim = Some(dispatcher);
        self
    }

    /// Appends every received lead event to `event_log`.
    #[must_use]
    pub fn with_event_log(mut self, event_log: Arc<dyn PushEventLog>) -> Self {
        self.event_log = Some(event_log);
        self
    }

    /// Bounds how many events are handled concurrently. Zero is treated as one.
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.handler_slots = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }

    /// Replaces the reconnect policy.
    #[must_use]
    pub fn with_reconnect_policy(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Handles one received event.
    ///
    /// Subscribed events are written to the event log, when one is set, after the claim or
    /// enqueue. Log failures are only warned about.
    pub async fn handle_event(&self, event: PushEvent) -> ListenerAction {
        let Some(kind) = event.kind() else {
            return ListenerAction::Ignored;
        };

        let Some(opportunity_id) = extract_opportunity_id(&event.payload) else {
            warn!(event = kind.as_str(), region = %self.region, "push event without opportunity id");
            self.log_event(|| PushEventRecord::unresolved(kind, &self.region, event.payload))
                .await;
            return ListenerAction::MissingIdentifier;
        };
        let lead = Lead {
            opportunity_id,
            region: self.region.clone(),
            raw_payload: event.payload,
        };

        info!(
            event = kind.as_str(),
            opportunity_id = %lead.opportunity_id,
            region = %self.region,
            "lead event received"
        );

        let action = self.dispatch_lead(&lead).await;
        self.log_event(|| PushEventRecord::for_lead(kind, &lead)).await;
        action
    }

    async fn dispatch_lead(&self, lead: &Lead) -> ListenerAction {
        if let Some(dispatcher) = &self.auto_claim {
            match dispatcher.claim_now(&lead.opportunity_id, &lead.region).await {
                Ok(attempt) => return ListenerAction::Claimed(attempt),
                Err(error) => {
                    warn!(
                        opportunity_id = %lead.opportunity_id,
                        region = %self.region,
                        error = %error,
                        "direct claim unavailable; enqueueing instead"
                    );
                }
            }
        }

        match self.ingestion.enqueue_lead(lead, "push").await {
            Ok(job_id) => ListenerAction::Enqueued(job_id),
            Err(error) => {
                warn!(
                    opportunity_id = %lead.opportunity_id,
                    region = %self.region,
                    error = %error,
                    "failed to enqueue pushed lead"
                );
                ListenerAction::Dropped(error.to_string())
            }
        }
    }

    async fn log_event(&self, record: impl FnOnce() -> PushEventRecord) {
        let Some(event_log) = &self.event_log else {
            return;
        };

        if let Err(error) = event_log.append(record()).await {
            warn!(region = %self.region, error = %error, "failed to log push event");
        }
    }

    fn spawn_handler(&self, handlers: &mut JoinSet<ListenerAction>, event: PushEvent) {
        let listener = self.clone();
        handlers.spawn(async move {
            let Ok(_slot) = listener.handler_slots.clone().acquire_owned().await else {
                return ListenerAction::Dropped("listener slots closed".to_owned());
            };
            listener.handle_event(event).await
        });
    }

    fn observe_handler(&self, joined: Result<ListenerAction, JoinError>) {
        if let Err(error) = joined {
            warn!(region = %self.region, error = %error, "push event handler aborted");
        }
    }

    async fn listen_once(&self, shutdown: &mut watch::Receiver<bool>) -> AppResult<bool> {
        let auth = self.tokens.fetch_token(&self.region).await?;
        let mut connection = self.connector.connect(&auth).await?;
        info!(region = %self.region, "push channel open");

        let mut handlers = JoinSet::new();
        let stopped = loop {
            let next = tokio::select! {
                _ = shutdown.changed() => break true,
                next = connection.next_event() => next,
            };

            match next {
                Ok(Some(event)) => self.spawn_handler(&mut handlers, event),
                Ok(None) => {
                    info!(region = %self.region, "push channel closed");
                    break false;
                }
                Err(error) => {
                    warn!(region = %self.region, error = %error, "push channel error");
                    break false;
                }
            }

            while let Some(joined) = handlers.try_join_next() {
                self.observe_handler(joined);
            }
        };

        if !handlers.is_empty() {
            info!(region = %self.region, in_flight = handlers.len(), "waiting for push event handlers");
        }
        while let Some(joined) = handlers.join_next().await {
            self.observe_handler(joined);
        }

        Ok(stopped)
    }

    /// Listens until shutdown, reconnecting per the policy.
    ///
    /// Returns once shutdown is signalled or reconnect attempts are exhausted.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut failures = 0_u32;

        loop {
            match self.listen_once(&mut shutdown).await {
                Ok(true) => break,
                Ok(false) => failures = 1,
                Err(error) => {
                    failures = failures.saturating_add(1);
                    warn!(
                        region = %self.region,
                        attempt = failures,
                        error = %error,
                        "push channel connect failed"
                    );
                }
            }

            let Some(delay) = self.reconnect.delay_for(failures) else {
                warn!(region = %self.region, attempts = failures, "push channel reconnect abandoned");
                return;
            };

            info!(
                region = %self.region,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                "push channel reconnecting"
            );
            tokio::select! {
                _ = shutdown.changed() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!(region = %self.region, "push listener stopped");
    }
}
