use leadclaim_core::{AppError, AppResult, NonEmptyString, Region};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field names under which upstream payloads carry the opportunity identifier.
pub const OPPORTUNITY_ID_FIELDS: [&str; 6] = [
    "opportunityId",
    "opportunityID",
    "OpportunityId",
    "OpportunityID",
    "id",
    "Id",
];

/// Opaque identifier of a contested opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpportunityId(NonEmptyString);

impl OpportunityId {
    /// Creates a validated opportunity identifier. Surrounding whitespace is trimmed.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        NonEmptyString::new(value.trim())
            .map(Self)
            .map_err(|_| AppError::Validation("opportunity id must not be empty".to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for OpportunityId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Transient lead sourced from the listing endpoint or a push event.
#[derive(Debug, Clone, PartialEq)]
pub struct Lead {
    /// Resolved opportunity identifier.
    pub opportunity_id: OpportunityId,
    /// Region the lead was observed for.
    pub region: Region,
    /// Upstream payload as received.
    pub raw_payload: Value,
}

impl Lead {
    /// Normalizes one upstream payload into a lead.
    ///
    /// Returns `None` when no identifier field variant resolves.
    #[must_use]
    pub fn from_payload(raw_payload: Value, region: &Region) -> Option<Self> {
        let opportunity_id = extract_opportunity_id(&raw_payload)?;
        Some(Self {
            opportunity_id,
            region: region.clone(),
            raw_payload,
        })
    }
}

/// Resolves the opportunity identifier from any supported field variant.
///
/// String and integer values are accepted; blank strings are not.
#[must_use]
pub fn extract_opportunity_id(payload: &Value) -> Option<OpportunityId> {
    let object = payload.as_object()?;

    OPPORTUNITY_ID_FIELDS.iter().find_map(|field| {
        let value = object.get(*field)?;
        let candidate = match value {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            _ => return None,
        };
        OpportunityId::new(candidate).ok()
    })
}

/// Extracts the lead item list from a pending-leads listing response.
///
/// Accepted shapes, in order: a `pagedResults` array, a `data` array, or a bare array.
pub fn extract_listing_items(payload: &Value) -> AppResult<&[Value]> {
    if let Some(items) = payload.as_array() {
        return Ok(items.as_slice());
    }

    ["pagedResults", "data"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .ok_or_else(|| {
            AppError::Validation(
                "unrecognized listing payload: expected an array, 'pagedResults', or 'data'"
                    .to_owned(),
            )
        })
}

#[cfg(test)]
mod tests {
    use leadclaim_core::Region;
    use proptest::prelude::*;
    use serde_json::json;

    use super::{Lead, OPPORTUNITY_ID_FIELDS, extract_listing_items, extract_opportunity_id};

    fn region() -> Region {
        Region::new("Central FL").unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn listing_accepts_all_three_shapes() {
        let paged = json!({"pagedResults": [{"opportunityId": "A1"}]});
        let data = json!({"data": [{"id": "B2"}, {"id": "B3"}]});
        let bare = json!([{"OpportunityId": "C4"}]);

        assert_eq!(extract_listing_items(&paged).map(<[_]>::len).ok(), Some(1));
        assert_eq!(extract_listing_items(&data).map(<[_]>::len).ok(), Some(2));
        assert_eq!(extract_listing_items(&bare).map(<[_]>::len).ok(), Some(1));
    }

    #[test]
    fn listing_rejects_unknown_shape() {
        assert!(extract_listing_items(&json!({"results": []})).is_err());
        assert!(extract_listing_items(&json!("nope")).is_err());
    }

    #[test]
    fn identifier_accepts_numbers_and_rejects_blanks() {
        assert_eq!(
            extract_opportunity_id(&json!({"id": 4411}))
                .as_ref()
                .map(|id| id.as_str()),
            Some("4411")
        );
        assert!(extract_opportunity_id(&json!({"opportunityId": "   "})).is_none());
        assert!(extract_opportunity_id(&json!({"opportunityId": null})).is_none());
        assert!(extract_opportunity_id(&json!(["A1"])).is_none());
    }

    #[test]
    fn lead_keeps_raw_payload() {
        let payload = json!({"OpportunityId": "X9", "status": "new"});
        let lead = Lead::from_payload(payload.clone(), &region());

        assert!(lead.is_some());
        let lead = lead.unwrap_or_else(|| unreachable!());
        assert_eq!(lead.opportunity_id.as_str(), "X9");
        assert_eq!(lead.raw_payload, payload);
        assert_eq!(lead.region, region());
    }

    proptest! {
        #[test]
        fn every_field_variant_resolves(
            field_index in 0..OPPORTUNITY_ID_FIELDS.len(),
            id in "[A-Za-z0-9-]{1,24}",
        ) {
            let mut payload = serde_json::Map::new();
            payload.insert(OPPORTUNITY_ID_FIELDS[field_index].to_owned(), json!(id.clone()));

            let resolved = extract_opportunity_id(&serde_json::Value::Object(payload));
            prop_assert_eq!(resolved.map(|value| value.as_str().to_owned()), Some(id));
        }
    }
}
