use async_trait::async_trait;
use leadclaim_core::{AppResult, Region};
use leadclaim_domain::{ClaimResult, OpportunityId};

/// What happened to one claim result write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    /// No row existed for the pair; one was written.
    Inserted,
    /// An earlier failure row was replaced.
    Superseded,
    /// A success row already existed; the write was a no-op.
    Unchanged,
    /// The write failed and was discarded.
    Dropped(String),
}

impl RecordStatus {
    /// Returns stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Superseded => "superseded",
            Self::Unchanged => "unchanged",
            Self::Dropped(_) => "dropped",
        }
    }
}

/// Store of claim outcomes, unique per (opportunity, region).
///
/// A `success` row is final. A failure row may be replaced by a later write.
#[async_trait]
pub trait ClaimResultRepository: Send + Sync {
    /// Writes one result according to the uniqueness and supersession rules.
    async fn insert_result(&self, result: ClaimResult) -> AppResult<RecordStatus>;

    /// Returns the stored result for one pair.
    async fn find_result(
        &self,
        opportunity_id: &OpportunityId,
        region: &Region,
    ) -> AppResult<Option<ClaimResult>>;

    /// Lists the most recently recorded results, newest first.
    async fn list_recent(&self, limit: usize) -> AppResult<Vec<ClaimResult>>;
}
