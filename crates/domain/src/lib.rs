//! Domain entities and invariants for lead claiming.

#![forbid(unsafe_code)]

mod claim;
mod event;
mod job;
mod lead;

pub use claim::{
    CLAIM_SUCCESS_CODES, ClaimAttempt, ClaimEndpoint, ClaimResult, ClaimResultStatus,
    RESPONSE_EXCERPT_MAX_CHARS, TRANSPORT_FAILURE_CODE, is_claim_success, response_excerpt,
};
pub use event::{EVENT_LOG_RETENTION_DAYS, LeadEventKind, PushEvent, PushEventRecord};
pub use job::{Job, JobId, JobPayload, JobStatus};
pub use lead::{
    Lead, OPPORTUNITY_ID_FIELDS, OpportunityId, extract_listing_items, extract_opportunity_id,
};
