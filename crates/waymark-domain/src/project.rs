// project.rs — The Project aggregate.
//
// Projects are the smallest of the lifecycle entities: one optional
// purpose field and a tri-state update. Two behaviors here intentionally
// diverge from Goal and must stay that way:
//
//   - `update` takes a Patch (absent = keep, null = clear, value = set),
//     so a caller can clear the purpose without a separate command;
//   - an update that changes nothing returns Ok(None) — a silent no-op,
//     not the NoChangesProvided error goals raise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waymark_events::EventRecord;

use crate::error::DomainError;
use crate::goal::MAX_TEXT_LEN;
use crate::patch::{self, Patch};
use crate::rules::Checks;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdatedPayload {
    #[serde(
        default,
        skip_serializing_if = "Patch::is_keep",
        with = "patch::double_option"
    )]
    pub purpose: Patch<String>,
}

/// The closed tag set of project events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProjectEvent {
    #[serde(rename = "project_defined")]
    Defined(DefinedPayload),
    #[serde(rename = "project_updated")]
    Updated(ProjectUpdatedPayload),
}

impl ProjectEvent {
    pub const TYPES: &'static [&'static str] = &["project_defined", "project_updated"];

    pub fn event_type(&self) -> &'static str {
        match self {
            ProjectEvent::Defined(_) => "project_defined",
            ProjectEvent::Updated(_) => "project_updated",
        }
    }

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

/// The Project aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub purpose: Option<String>,
    pub version: u32,
}

impl Project {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            purpose: None,
            version: 0,
        }
    }

    pub fn rehydrate(id: &str, history: &[EventRecord]) -> Result<Self, DomainError> {
        let mut project = Project::new(id);
        for record in history {
            let event = ProjectEvent::from_record(record)?;
            project.apply(&event);
            project.version = record.version;
        }
        Ok(project)
    }

    /// Define the project. Only valid on a fresh stream.
    pub fn define(
        &mut self,
        purpose: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, DomainError> {
        if self.version != 0 {
            return Err(DomainError::AlreadyDefined(self.id.clone()));
        }

        let mut checks = Checks::new();
        if let Some(purpose) = &purpose {
            checks.max_len("purpose", "Purpose", purpose, MAX_TEXT_LEN);
        }
        checks.into_result()?;

        self.seal(ProjectEvent::Defined(DefinedPayload { purpose }), now)
    }

    /// Patch the purpose. Returns `Ok(None)` when the patch would change
    /// nothing — the caller skips append and publish entirely.
    pub fn update(
        &mut self,
        purpose: Patch<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<EventRecord>, DomainError> {
        let mut checks = Checks::new();
        if let Patch::Set(value) = &purpose {
            checks.max_len("purpose", "Purpose", value, MAX_TEXT_LEN);
        }
        checks.into_result()?;

        if !purpose.changes(&self.purpose) {
            return Ok(None);
        }

        self.seal(ProjectEvent::Updated(ProjectUpdatedPayload { purpose }), now)
            .map(Some)
    }

    fn seal(
        &mut self,
        event: ProjectEvent,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, DomainError> {
        let record = event.into_record(&self.id, self.version + 1, now)?;
        self.apply(&event);
        self.version = record.version;
        Ok(record)
    }

    pub fn apply(&mut self, event: &ProjectEvent) {
        match event {
            ProjectEvent::Defined(p) => {
                self.purpose = p.purpose.clone();
            }
            ProjectEvent::Updated(p) => {
                p.purpose.apply_to(&mut self.purpose);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    fn defined_project() -> Project {
        let mut project = Project::new("p1");
        project.define(Some("Ship the tracker".into()), t0()).unwrap();
        project
    }

    #[test]
    fn define_then_rehydrate() {
        let mut project = Project::new("p1");
        let record = project.define(Some("Ship the tracker".into()), t0()).unwrap();
        assert_eq!(record.version, 1);

        let rehydrated = Project::rehydrate("p1", &[record]).unwrap();
        assert_eq!(rehydrated, project);
    }

    #[test]
    fn define_twice_is_already_defined() {
        let mut project = defined_project();
        let err = project.define(None, t0()).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyDefined(_)));
    }

    // The no-op path: identical value → no event, version untouched.
    #[test]
    fn update_with_identical_value_is_a_silent_noop() {
        let mut project = defined_project();
        let result = project
            .update(Patch::Set("Ship the tracker".into()), t0())
            .unwrap();
        assert!(result.is_none());
        assert_eq!(project.version, 1);
    }

    #[test]
    fn update_with_keep_is_a_silent_noop() {
        let mut project = defined_project();
        assert!(project.update(Patch::Keep, t0()).unwrap().is_none());
        assert_eq!(project.version, 1);
    }

    #[test]
    fn update_set_changes_the_purpose() {
        let mut project = defined_project();
        let record = project
            .update(Patch::Set("New direction".into()), t0())
            .unwrap()
            .unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.payload["purpose"], "New direction");
        assert_eq!(project.purpose.as_deref(), Some("New direction"));
    }

    #[test]
    fn update_clear_encodes_null_and_clears() {
        let mut project = defined_project();
        let record = project.update(Patch::Clear, t0()).unwrap().unwrap();
        // Explicit null on the wire — distinct from an absent key.
        assert!(record.payload.get("purpose").is_some());
        assert!(record.payload["purpose"].is_null());
        assert!(project.purpose.is_none());

        // Clearing an already-empty purpose is a no-op again.
        assert!(project.update(Patch::Clear, t0()).unwrap().is_none());
    }

    // A handler appends only what the aggregate emits: the no-op path
    // produces nothing to append or publish.
    #[test]
    fn noop_update_appends_nothing() {
        use waymark_events::{EventStore, MemoryEventStore};

        let store = MemoryEventStore::new();
        let mut project = Project::new("p1");
        store
            .append(&project.define(Some("Initial".into()), t0()).unwrap())
            .unwrap();

        if let Some(record) = project.update(Patch::Set("Initial".into()), t0()).unwrap() {
            store.append(&record).unwrap();
        }

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_round_trips_through_rehydration() {
        let mut project = Project::new("p1");
        let mut records = Vec::new();
        records.push(project.define(Some("Initial".into()), t0()).unwrap());
        records.push(project.update(Patch::Clear, t0()).unwrap().unwrap());

        let rehydrated = Project::rehydrate("p1", &records).unwrap();
        assert!(rehydrated.purpose.is_none());
        assert_eq!(rehydrated.version, 2);
    }
}
