//! Application services and ports for lead claim dispatch.

#![forbid(unsafe_code)]

mod claim_dispatch_service;
mod claim_ports;
mod event_retention;
mod ingestion_service;
mod live_listener;
mod result_recorder;
mod token_service;
mod worker_pool;

#[cfg(test)]
mod test_support;

pub use claim_dispatch_service::{ClaimDispatchService, JobOutcome};
pub use claim_ports::{
    AuthTokenCache, ClaimResultRepository, ClaimStrategy, JobRepository, LeadListingSource,
    PushChannelConnector, PushConnection, PushEventLog, QueueStats, RecordStatus, TokenProvider,
};
pub use event_retention::EventLogRetention;
pub use ingestion_service::{IngestionService, LeadPoller, PollOutcome};
pub use live_listener::{ListenerAction, LiveListener, ReconnectPolicy};
pub use result_recorder::ResultRecorder;
pub use token_service::CachedTokenProvider;
pub use worker_pool::{PoolSummary, WorkerPool, WorkerPoolSettings};
