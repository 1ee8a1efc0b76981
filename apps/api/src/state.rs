use std::sync::Arc;

use leadclaim_application::{ClaimResultRepository, JobRepository, PushEventLog};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobRepository>,
    pub results: Arc<dyn ClaimResultRepository>,
    pub events: Arc<dyn PushEventLog>,
}
