use chrono::{DateTime, Utc};
use leadclaim_core::{AppError, AppResult, Region};
use serde::{Deserialize, Serialize};

use crate::OpportunityId;

/// HTTP status codes treated as a won claim.
pub const CLAIM_SUCCESS_CODES: [u16; 3] = [200, 201, 204];

/// Result code recorded when a claim request never produced a response.
pub const TRANSPORT_FAILURE_CODE: u16 = 0;

/// Maximum number of response-body characters kept with a claim result.
pub const RESPONSE_EXCERPT_MAX_CHARS: usize = 512;

/// Returns whether a claim result code counts as success.
#[must_use]
pub fn is_claim_success(code: u16) -> bool {
    CLAIM_SUCCESS_CODES.contains(&code)
}

/// Endpoint shape that produced a claim outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimEndpoint {
    /// `POST {apiRoot}/Opportunity/Claim/{id}` with an empty body.
    Primary,
    /// `POST {apiRoot}/Opportunity/{id}/Claim` with an optional dealer body.
    Secondary,
}

impl ClaimEndpoint {
    /// Returns stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Outcome of one claim attempt across both endpoint shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimAttempt {
    /// HTTP status of the deciding request, or `0` on transport failure.
    pub code: u16,
    /// Endpoint whose response decided the outcome.
    pub endpoint: ClaimEndpoint,
    /// Wall time across all requests of the attempt.
    pub latency_ms: i64,
    /// Leading slice of the deciding response body.
    pub response_excerpt: Option<String>,
}

impl ClaimAttempt {
    /// Returns whether the claim was won.
    #[must_use]
    pub fn is_success(&self) -> bool {
        is_claim_success(self.code)
    }

    /// Returns the result status this attempt should be recorded with.
    #[must_use]
    pub fn result_status(&self) -> ClaimResultStatus {
        ClaimResultStatus::from_code(self.code)
    }
}

/// Truncates a response body to the stored excerpt length.
#[must_use]
pub fn response_excerpt(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    Some(trimmed.chars().take(RESPONSE_EXCERPT_MAX_CHARS).collect())
}

/// Persisted claim status: `success` or `fail:<code>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimResultStatus {
    /// Claim won.
    Success,
    /// Claim lost or errored with the given code.
    Failed(u16),
}

impl ClaimResultStatus {
    /// Classifies a claim result code.
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        if is_claim_success(code) {
            Self::Success
        } else {
            Self::Failed(code)
        }
    }

    /// Returns whether this status is a won claim.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns stable storage value.
    #[must_use]
    pub fn as_storage(&self) -> String {
        match self {
            Self::Success => "success".to_owned(),
            Self::Failed(code) => format!("fail:{code}"),
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        if value == "success" {
            return Ok(Self::Success);
        }

        value
            .strip_prefix("fail:")
            .and_then(|code| code.parse::<u16>().ok())
            .map(Self::Failed)
            .ok_or_else(|| {
                AppError::Validation(format!("unknown claim result status '{value}'"))
            })
    }
}

/// Persisted claim outcome, unique per (opportunity, region).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimResult {
    /// Claimed opportunity.
    pub opportunity_id: OpportunityId,
    /// Region whose identity attempted the claim.
    pub region: Region,
    /// Outcome status.
    pub status: ClaimResultStatus,
    /// Time the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Claim latency when measured.
    pub latency_ms: Option<i64>,
    /// Response body excerpt when available.
    pub response_excerpt: Option<String>,
}

impl ClaimResult {
    /// Builds the record for one finished claim attempt.
    #[must_use]
    pub fn from_attempt(
        opportunity_id: OpportunityId,
        region: Region,
        attempt: &ClaimAttempt,
    ) -> Self {
        Self {
            opportunity_id,
            region,
            status: attempt.result_status(),
            recorded_at: Utc::now(),
            latency_ms: Some(attempt.latency_ms),
            response_excerpt: attempt.response_excerpt.clone(),
        }
    }
}
