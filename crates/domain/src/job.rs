use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use leadclaim_core::{AppError, AppResult, Region};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::OpportunityId;

/// Identifier of a persisted claim job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Creates a random job identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a job identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lifecycle status of a claim job.
///
/// Status only ever moves forward: `Queued -> Processing -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed by a worker.
    Queued,
    /// Claimed by a worker and in flight.
    Processing,
    /// Terminal, regardless of claim outcome.
    Done,
}

impl JobStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            _ => Err(AppError::Validation(format!(
                "unknown job status '{value}'"
            ))),
        }
    }

    /// Returns whether moving from `self` to `next` keeps status monotonic.
    ///
    /// Re-entering `Done` is allowed so completion stays idempotent.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Done, Self::Done) => true,
            (current, next) => next > *current,
        }
    }
}

/// Work item payload: only the identifier and region survive from a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Opportunity to claim.
    pub opportunity_id: OpportunityId,
    /// Region whose credentials are used.
    pub region: Region,
}

/// Persisted claim job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Job identifier.
    pub id: JobId,
    /// Claim target.
    pub payload: JobPayload,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Enqueue timestamp.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Creates a freshly queued job.
    #[must_use]
    pub fn queued(payload: JobPayload) -> Self {
        Self {
            id: JobId::new(),
            payload,
            status: JobStatus::Queued,
            created_at: Utc::now(),
        }
    }

    /// Moves the job to `next`, rejecting backward transitions.
    pub fn transition_to(&mut self, next: JobStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "job '{}' cannot move from '{}' to '{}'",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }

        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use leadclaim_core::Region;
    use proptest::prelude::*;

    use super::{Job, JobPayload, JobStatus};
    use crate::OpportunityId;

    fn payload() -> JobPayload {
        JobPayload {
            opportunity_id: OpportunityId::new("A1").unwrap_or_else(|_| unreachable!()),
            region: Region::new("Central FL").unwrap_or_else(|_| unreachable!()),
        }
    }

    fn any_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Queued),
            Just(JobStatus::Processing),
            Just(JobStatus::Done),
        ]
    }

    #[test]
    fn job_walks_forward_to_done() {
        let mut job = Job::queued(payload());
        assert!(job.transition_to(JobStatus::Processing).is_ok());
        assert!(job.transition_to(JobStatus::Done).is_ok());
        assert!(job.transition_to(JobStatus::Done).is_ok());
        assert_eq!(job.status, JobStatus::Done);
    }

    #[test]
    fn job_rejects_backward_transition() {
        let mut job = Job::queued(payload());
        assert!(job.transition_to(JobStatus::Processing).is_ok());
        assert!(job.transition_to(JobStatus::Queued).is_err());
        assert!(job.transition_to(JobStatus::Processing).is_err());
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(JobStatus::parse("leased").is_err());
        assert_eq!(JobStatus::parse("processing").ok(), Some(JobStatus::Processing));
    }

    proptest! {
        #[test]
        fn status_never_moves_backward(sequence in proptest::collection::vec(any_status(), 1..12)) {
            let mut job = Job::queued(payload());
            for next in sequence {
                let before = job.status;
                let _ = job.transition_to(next);
                prop_assert!(job.status >= before);
            }
        }
    }
}
