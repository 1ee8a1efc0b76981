use chrono::{DateTime, Utc};
use leadclaim_core::Region;
use serde_json::Value;

use crate::lead::{Lead, OpportunityId};

/// Default number of days received push events are kept in the event log.
pub const EVENT_LOG_RETENTION_DAYS: i64 = 7;

/// Named push-channel events that may announce a claimable lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadEventKind {
    /// A lead became available in the pool.
    LeadAvailable,
    /// The lead pool contents changed.
    LeadPoolUpdated,
    /// An opportunity became available.
    OpportunityAvailable,
    /// An opportunity was created.
    OpportunityCreated,
    /// An opportunity changed.
    OpportunityChanged,
    /// An opportunity summary row changed.
    OpportunitySummaryUpdated,
    /// A lead was pushed to this dealer.
    NewLeadForDealer,
    /// The dealer has an available lead.
    HasAvailableLead,
    /// Generic hub message.
    Message,
    /// Generic hub receive.
    Receive,
}

impl LeadEventKind {
    /// Every event the live listener subscribes to.
    pub const ALL: [Self; 10] = [
        Self::LeadAvailable,
        Self::LeadPoolUpdated,
        Self::OpportunityAvailable,
        Self::OpportunityCreated,
        Self::OpportunityChanged,
        Self::OpportunitySummaryUpdated,
        Self::NewLeadForDealer,
        Self::HasAvailableLead,
        Self::Message,
        Self::Receive,
    ];

    /// Returns the hub method name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadAvailable => "LeadAvailable",
            Self::LeadPoolUpdated => "LeadPoolUpdated",
            Self::OpportunityAvailable => "OpportunityAvailable",
            Self::OpportunityCreated => "OpportunityCreated",
            Self::OpportunityChanged => "OpportunityChanged",
            Self::OpportunitySummaryUpdated => "OpportunitySummaryUpdated",
            Self::NewLeadForDealer => "NewLeadForDealer",
            Self::HasAvailableLead => "HasAvailableLead",
            Self::Message => "message",
            Self::Receive => "receive",
        }
    }

    /// Resolves a hub method name. Hub method names are case-insensitive.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }
}

/// One invocation received from the push channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    /// Hub method name as sent by the server.
    pub name: String,
    /// First invocation argument.
    pub payload: Value,
}

impl PushEvent {
    /// Creates a push event.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Returns the subscribed event kind, if any.
    #[must_use]
    pub fn kind(&self) -> Option<LeadEventKind> {
        LeadEventKind::parse(self.name.as_str())
    }
}

/// Audit entry for one received push event.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEventRecord {
    /// Canonical hub method name.
    pub event_name: String,
    /// Region whose connection received the event.
    pub region: Region,
    /// Identifier resolved from the payload, when one was present.
    pub opportunity_id: Option<OpportunityId>,
    /// Payload as received.
    pub payload: Value,
    /// Receive time.
    pub recorded_at: DateTime<Utc>,
}

impl PushEventRecord {
    /// Records an event that resolved to a lead.
    #[must_use]
    pub fn for_lead(kind: LeadEventKind, lead: &Lead) -> Self {
        Self {
            event_name: kind.as_str().to_owned(),
            region: lead.region.clone(),
            opportunity_id: Some(lead.opportunity_id.clone()),
            payload: lead.raw_payload.clone(),
            recorded_at: Utc::now(),
        }
    }

    /// Records an event whose payload carried no opportunity identifier.
    #[must_use]
    pub fn unresolved(kind: LeadEventKind, region: &Region, payload: Value) -> Self {
        Self {
            event_name: kind.as_str().to_owned(),
            region: region.clone(),
            opportunity_id: None,
            payload,
            recorded_at: Utc::now(),
        }
    }
}
