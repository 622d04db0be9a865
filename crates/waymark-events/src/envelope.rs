// envelope.rs — The durable event envelope.
//
// Every state change in Waymark is recorded as one EventRecord in the
// append-only log. The wire shape is stable for the lifetime of a log:
//
//   {"type": "goal_started", "aggregateId": "…", "version": 2,
//    "timestamp": "2026-08-07T12:00:00Z", "payload": {…}}
//
// Field names are camelCase on the wire (existing logs were written that
// way and must keep replaying). Records are created only by aggregate
// command methods and are never mutated or deleted once appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single immutable event in an aggregate's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Closed tag identifying the event kind (e.g. `goal_blocked`).
    #[serde(rename = "type")]
    pub event_type: String,

    /// The stream this event belongs to.
    pub aggregate_id: String,

    /// Position within the stream. Starts at 1 and increases by 1 per
    /// event under single-writer execution.
    pub version: u32,

    /// When the event was recorded (UTC, RFC 3339 on the wire).
    pub timestamp: DateTime<Utc>,

    /// Event-type-specific fields. Carries only changed/relevant fields;
    /// projectors treat an absent field as "no change", never as "clear".
    pub payload: serde_json::Value,
}

impl EventRecord {
    /// Build a record. Callers (aggregate command methods) are responsible
    /// for version assignment; the store assigns the global sequence.
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        version: u32,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            version,
            timestamp,
            payload,
        }
    }
}

/// Result of appending a record: the store-assigned global sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendResult {
    /// Global position of the appended event across all streams.
    pub next_seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> EventRecord {
        EventRecord::new(
            "goal_added",
            "g1",
            1,
            Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap(),
            serde_json::json!({"objective": "Ship it"}),
        )
    }

    #[test]
    fn wire_keys_are_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "goal_added");
        assert_eq!(json["aggregateId"], "g1");
        assert_eq!(json["version"], 1);
        assert_eq!(json["timestamp"], "2026-08-07T12:00:00Z");
        assert_eq!(json["payload"]["objective"], "Ship it");
    }

    #[test]
    fn serialization_round_trip() {
        let record = sample();
        let json = serde_json::to_string(&record).unwrap();
        let restored: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, restored);
    }
}
