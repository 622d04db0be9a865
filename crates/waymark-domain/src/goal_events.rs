// goal_events.rs — The closed set of goal lifecycle events.
//
// Each variant is one durable fact about a goal. The enum serializes
// adjacently tagged (`"type"` + `"data"`), which maps 1:1 onto the
// envelope's `type` and `payload` fields; `into_record`/`from_record`
// bridge between the typed enum and the generic EventRecord.
//
// The tag set is closed: decoding an unknown type is an error, not a
// skip. A stream that replays with missing facts would rehydrate to a
// wrong state, so replay fails loudly instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waymark_events::EventRecord;

use crate::error::DomainError;

/// Embedded working context captured when a goal is added: the surrounding
/// constraints an agent needs without re-deriving them from the codebase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalContext {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invariants: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guidelines: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architecture_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl GoalContext {
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
            && self.guidelines.is_empty()
            && self.dependencies.is_empty()
            && self.components.is_empty()
            && self.architecture_notes.is_empty()
            && self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedPayload {
    pub objective: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope_in: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope_out: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boundaries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<GoalContext>,
}

/// Start and resume both carry the refreshed claim so the rehydrated state
/// echoes the last known lease without consulting the claim table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedPayload {
    pub claimed_by: String,
    pub claimed_at: DateTime<Utc>,
    pub claim_expires_at: DateTime<Utc>,
}

/// Partial-field update: only the fields that were explicitly provided
/// appear in the payload. Absence means "no change", never "clear".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criteria: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_out: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl UpdatedPayload {
    /// True when no field was provided at all.
    pub fn is_empty(&self) -> bool {
        self.objective.is_none()
            && self.success_criteria.is_none()
            && self.scope_in.is_none()
            && self.scope_out.is_none()
            && self.boundaries.is_none()
            && self.note.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedPayload {
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnblockedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedPayload {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub claimed_by: String,
    pub claimed_at: DateTime<Utc>,
    pub claim_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyPayload {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedPayload {
    pub turn_number: u32,
}

/// The closed tag set of goal events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GoalEvent {
    #[serde(rename = "goal_added")]
    Added(AddedPayload),
    #[serde(rename = "goal_started")]
    Started(StartedPayload),
    #[serde(rename = "goal_updated")]
    Updated(UpdatedPayload),
    #[serde(rename = "goal_blocked")]
    Blocked(BlockedPayload),
    #[serde(rename = "goal_unblocked")]
    Unblocked(UnblockedPayload),
    #[serde(rename = "goal_paused")]
    Paused(PausedPayload),
    #[serde(rename = "goal_resumed")]
    Resumed(ResumedPayload),
    #[serde(rename = "goal_completed")]
    Completed(EmptyPayload),
    #[serde(rename = "goal_reset")]
    Reset(EmptyPayload),
    #[serde(rename = "goal_submitted_for_review")]
    SubmittedForReview(EmptyPayload),
    #[serde(rename = "goal_qualified")]
    Qualified(EmptyPayload),
    #[serde(rename = "goal_removed")]
    Removed(EmptyPayload),
    #[serde(rename = "goal_reviewed")]
    Reviewed(ReviewedPayload),
}

impl GoalEvent {
    /// Every tag in the closed set, in lifecycle order. Used to register
    /// projectors on the bus and to filter streams during rebuild.
    pub const TYPES: &'static [&'static str] = &[
        "goal_added",
        "goal_started",
        "goal_updated",
        "goal_blocked",
        "goal_unblocked",
        "goal_paused",
        "goal_resumed",
        "goal_completed",
        "goal_reset",
        "goal_submitted_for_review",
        "goal_qualified",
        "goal_removed",
        "goal_reviewed",
    ];

    /// The wire tag for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            GoalEvent::Added(_) => "goal_added",
            GoalEvent::Started(_) => "goal_started",
            GoalEvent::Updated(_) => "goal_updated",
            GoalEvent::Blocked(_) => "goal_blocked",
            GoalEvent::Unblocked(_) => "goal_unblocked",
            GoalEvent::Paused(_) => "goal_paused",
            GoalEvent::Resumed(_) => "goal_resumed",
            GoalEvent::Completed(_) => "goal_completed",
            GoalEvent::Reset(_) => "goal_reset",
            GoalEvent::SubmittedForReview(_) => "goal_submitted_for_review",
            GoalEvent::Qualified(_) => "goal_qualified",
            GoalEvent::Removed(_) => "goal_removed",
            GoalEvent::Reviewed(_) => "goal_reviewed",
        }
    }

    /// Seal this event into the durable envelope at a specific stream
    /// position. The adjacently tagged serialization splits into the
    /// envelope's `type` and `payload` fields.
    pub fn into_record(
        &self,
        aggregate_id: &str,
        version: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<EventRecord, DomainError> {
        let tagged =
            serde_json::to_value(self).map_err(waymark_events::StoreError::Serialization)?;
        let payload = tagged
            .get("data")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        Ok(EventRecord::new(
            self.event_type(),
            aggregate_id,
            version,
            timestamp,
            payload,
        ))
    }

    /// Decode a durable envelope back into the typed event. Unknown tags
    /// and malformed payloads are errors — the tag set is closed.
    pub fn from_record(record: &EventRecord) -> Result<Self, DomainError> {
        let tagged = serde_json::json!({
            "type": record.event_type,
            "data": record.payload,
        });
        serde_json::from_value(tagged).map_err(|_| DomainError::UnknownEventType {
            event_type: record.event_type.clone(),
            version: record.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn record_round_trip() {
        let event = GoalEvent::Blocked(BlockedPayload {
            note: "waiting on API keys".into(),
        });
        let record = event.into_record("g1", 3, t0()).unwrap();

        assert_eq!(record.event_type, "goal_blocked");
        assert_eq!(record.aggregate_id, "g1");
        assert_eq!(record.version, 3);
        assert_eq!(record.payload["note"], "waiting on API keys");

        let decoded = GoalEvent::from_record(&record).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn payload_keys_are_camel_case() {
        let event = GoalEvent::Added(AddedPayload {
            objective: "Ship it".into(),
            success_criteria: vec!["tests pass".into()],
            scope_in: vec![],
            scope_out: vec![],
            boundaries: vec![],
            note: None,
            context: None,
        });
        let record = event.into_record("g1", 1, t0()).unwrap();
        assert!(record.payload.get("successCriteria").is_some());
        assert!(record.payload.get("success_criteria").is_none());
        // Omitted optionals are absent, not null.
        assert!(record.payload.get("note").is_none());
    }

    #[test]
    fn empty_payload_serializes_as_empty_object() {
        let record = GoalEvent::Completed(EmptyPayload {})
            .into_record("g1", 4, t0())
            .unwrap();
        assert_eq!(record.payload, serde_json::json!({}));
        assert_eq!(
            GoalEvent::from_record(&record).unwrap(),
            GoalEvent::Completed(EmptyPayload {})
        );
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let record = EventRecord::new(
            "goal_teleported",
            "g1",
            2,
            t0(),
            serde_json::json!({}),
        );
        let err = GoalEvent::from_record(&record).unwrap_err();
        assert!(matches!(
            err,
            DomainError::UnknownEventType { version: 2, .. }
        ));
    }

    #[test]
    fn types_list_matches_event_type() {
        // Every constructor's tag must be listed exactly once.
        let event = GoalEvent::Reviewed(ReviewedPayload { turn_number: 1 });
        assert!(GoalEvent::TYPES.contains(&event.event_type()));
        assert_eq!(
            GoalEvent::TYPES.len(),
            13,
            "tag list out of sync with the enum"
        );
    }
}
