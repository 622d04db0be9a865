// projection.rs — The goal read model and its bus-driven projector.
//
// Views are denormalized rows for cheap pre-checks and listings. They are
// eventually consistent with the log: command handlers publish each event
// synchronously after append, and the projector patches one row per
// event. Views are never authoritative — mutation decisions always go
// through full replay — and can be rebuilt from scratch at any time
// (rebuild.rs), so every patch here must be idempotent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waymark_events::{EventRecord, StoreError, Subscriber};

use crate::goal::GoalStatus;
use crate::goal_events::GoalEvent;
use crate::patch::Patch;

/// One denormalized read-model row per goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalView {
    pub id: String,
    pub objective: String,
    pub status: GoalStatus,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A keyed, partial patch of one view row. Absent fields leave the row
/// untouched; `version`/`updated_at` always move forward with the event.
#[derive(Debug, Clone)]
pub struct GoalViewPatch {
    pub id: String,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub objective: Option<String>,
    pub status: Option<GoalStatus>,
    pub note: Patch<String>,
    pub claimed_by: Patch<String>,
}

impl GoalViewPatch {
    fn for_record(record: &EventRecord) -> Self {
        Self {
            id: record.aggregate_id.clone(),
            version: record.version,
            updated_at: record.timestamp,
            objective: None,
            status: None,
            note: Patch::Keep,
            claimed_by: Patch::Keep,
        }
    }
}

/// Queryable goal views.
pub trait GoalViewStore: Send + Sync {
    fn find_by_id(&self, id: &str) -> Result<Option<GoalView>, StoreError>;
    fn find_by_status(&self, status: GoalStatus) -> Result<Vec<GoalView>, StoreError>;
    fn list(&self) -> Result<Vec<GoalView>, StoreError>;
    /// Apply a keyed patch, creating the row if it does not exist yet.
    fn upsert(&self, patch: &GoalViewPatch) -> Result<(), StoreError>;
    fn delete(&self, id: &str) -> Result<(), StoreError>;
    /// Drop every row (projection rebuild starts from empty state).
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-process view store for tests.
#[derive(Default)]
pub struct MemoryGoalViews {
    rows: Mutex<HashMap<String, GoalView>>,
}

impl MemoryGoalViews {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_patch(row: &mut GoalView, patch: &GoalViewPatch) {
    row.version = patch.version;
    row.updated_at = patch.updated_at;
    if let Some(objective) = &patch.objective {
        row.objective = objective.clone();
    }
    if let Some(status) = patch.status {
        row.status = status;
    }
    patch.note.apply_to(&mut row.note);
    patch.claimed_by.apply_to(&mut row.claimed_by);
}

impl GoalViewStore for MemoryGoalViews {
    fn find_by_id(&self, id: &str) -> Result<Option<GoalView>, StoreError> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    fn find_by_status(&self, status: GoalStatus) -> Result<Vec<GoalView>, StoreError> {
        let mut rows: Vec<GoalView> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    fn list(&self) -> Result<Vec<GoalView>, StoreError> {
        let mut rows: Vec<GoalView> = self.rows.lock().unwrap().values().cloned().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    fn upsert(&self, patch: &GoalViewPatch) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry(patch.id.clone()).or_insert_with(|| GoalView {
            id: patch.id.clone(),
            objective: String::new(),
            status: GoalStatus::ToDo,
            version: 0,
            note: None,
            claimed_by: None,
            updated_at: patch.updated_at,
        });
        apply_patch(row, patch);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.rows.lock().unwrap().remove(id);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.rows.lock().unwrap().clear();
        Ok(())
    }
}

/// Bus subscriber that keeps goal views in sync with the log.
///
/// One keyed upsert (or delete) per event. Re-running any prefix of the
/// stream produces the same rows, which is what makes full rebuilds safe.
pub struct GoalProjector {
    views: Arc<dyn GoalViewStore>,
}

impl GoalProjector {
    pub fn new(views: Arc<dyn GoalViewStore>) -> Self {
        Self { views }
    }

    /// Translate one event into a row patch. Events that only add to the
    /// stream (reviews) still bump version/updated_at.
    fn patch_for(record: &EventRecord, event: &GoalEvent) -> GoalViewPatch {
        let mut patch = GoalViewPatch::for_record(record);
        match event {
            GoalEvent::Added(p) => {
                patch.objective = Some(p.objective.clone());
                patch.status = Some(GoalStatus::ToDo);
                if let Some(note) = &p.note {
                    patch.note = Patch::Set(note.clone());
                }
            }
            GoalEvent::Started(p) => {
                patch.status = Some(GoalStatus::Doing);
                patch.claimed_by = Patch::Set(p.claimed_by.clone());
            }
            GoalEvent::Updated(p) => {
                patch.objective = p.objective.clone();
                if let Some(note) = &p.note {
                    patch.note = Patch::Set(note.clone());
                }
            }
            GoalEvent::Blocked(p) => {
                patch.status = Some(GoalStatus::Blocked);
                patch.note = Patch::Set(p.note.clone());
            }
            GoalEvent::Unblocked(p) => {
                patch.status = Some(GoalStatus::Doing);
                if let Some(note) = &p.note {
                    patch.note = Patch::Set(note.clone());
                }
            }
            GoalEvent::Paused(p) => {
                patch.status = Some(GoalStatus::Paused);
                patch.claimed_by = Patch::Clear;
                if let Some(note) = &p.note {
                    patch.note = Patch::Set(note.clone());
                }
            }
            GoalEvent::Resumed(p) => {
                patch.status = Some(GoalStatus::Doing);
                patch.claimed_by = Patch::Set(p.claimed_by.clone());
                if let Some(note) = &p.note {
                    patch.note = Patch::Set(note.clone());
                }
            }
            GoalEvent::Completed(_) => {
                patch.status = Some(GoalStatus::Completed);
                patch.claimed_by = Patch::Clear;
            }
            GoalEvent::Reset(_) => {
                patch.status = Some(GoalStatus::ToDo);
            }
            GoalEvent::SubmittedForReview(_) => {
                patch.status = Some(GoalStatus::InReview);
            }
            GoalEvent::Qualified(_) => {
                patch.status = Some(GoalStatus::Qualified);
            }
            GoalEvent::Removed(_) | GoalEvent::Reviewed(_) => {}
        }
        patch
    }
}

impl Subscriber for GoalProjector {
    fn handle(&self, record: &EventRecord) -> Result<(), StoreError> {
        // Streams can interleave entity families during rebuild; ignore
        // anything outside the goal tag set.
        if !GoalEvent::TYPES.contains(&record.event_type.as_str()) {
            return Ok(());
        }
        let event = GoalEvent::from_record(record)
            .map_err(|e| StoreError::Backend(format!("undecodable event: {e}")))?;

        match event {
            GoalEvent::Removed(_) => self.views.delete(&record.aggregate_id),
            event => self.views.upsert(&Self::patch_for(record, &event)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::claim::Claim;
    use crate::goal::{AddGoal, Goal};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    fn claim(worker: &str) -> Claim {
        Claim {
            goal_id: "g1".into(),
            claimed_by: worker.into(),
            claimed_at: t0(),
            claim_expires_at: t0() + chrono::Duration::minutes(30),
        }
    }

    fn project(records: &[EventRecord]) -> Arc<MemoryGoalViews> {
        let views = Arc::new(MemoryGoalViews::new());
        let projector = GoalProjector::new(Arc::clone(&views) as Arc<dyn GoalViewStore>);
        for record in records {
            projector.handle(record).unwrap();
        }
        views
    }

    fn sample_stream() -> Vec<EventRecord> {
        let mut goal = Goal::new("g1");
        let mut records = Vec::new();
        records.push(
            goal.add(
                AddGoal {
                    objective: "Ship the tracker".into(),
                    ..Default::default()
                },
                t0(),
            )
            .unwrap(),
        );
        records.push(goal.start(&claim("worker-a"), t0()).unwrap());
        records.push(goal.block("waiting on infra", t0()).unwrap());
        records
    }

    #[test]
    fn projector_builds_the_row() {
        let views = project(&sample_stream());
        let row = views.find_by_id("g1").unwrap().unwrap();
        assert_eq!(row.objective, "Ship the tracker");
        assert_eq!(row.status, GoalStatus::Blocked);
        assert_eq!(row.version, 3);
        assert_eq!(row.note.as_deref(), Some("waiting on infra"));
        assert_eq!(row.claimed_by.as_deref(), Some("worker-a"));
    }

    #[test]
    fn replaying_the_stream_is_idempotent() {
        let records = sample_stream();
        let views = Arc::new(MemoryGoalViews::new());
        let projector = GoalProjector::new(Arc::clone(&views) as Arc<dyn GoalViewStore>);
        for record in records.iter().chain(records.iter()) {
            projector.handle(record).unwrap();
        }
        let row = views.find_by_id("g1").unwrap().unwrap();
        assert_eq!(row.status, GoalStatus::Blocked);
        assert_eq!(row.version, 3);
    }

    #[test]
    fn removed_deletes_the_row() {
        let mut records = sample_stream();
        let mut goal = Goal::rehydrate("g1", &records).unwrap();
        records.push(goal.remove(t0()).unwrap());

        let views = project(&records);
        assert!(views.find_by_id("g1").unwrap().is_none());
    }

    #[test]
    fn completion_clears_the_claim_column() {
        let mut records = sample_stream();
        let mut goal = Goal::rehydrate("g1", &records).unwrap();
        records.push(goal.complete(t0()).unwrap());

        let views = project(&records);
        let row = views.find_by_id("g1").unwrap().unwrap();
        assert_eq!(row.status, GoalStatus::Completed);
        assert!(row.claimed_by.is_none());
    }

    #[test]
    fn foreign_event_types_are_ignored() {
        let views = Arc::new(MemoryGoalViews::new());
        let projector = GoalProjector::new(Arc::clone(&views) as Arc<dyn GoalViewStore>);
        let record = EventRecord::new(
            "project_defined",
            "p1",
            1,
            t0(),
            serde_json::json!({"purpose": "x"}),
        );
        projector.handle(&record).unwrap();
        assert!(views.list().unwrap().is_empty());
    }

    #[test]
    fn find_by_status_filters() {
        let views = project(&sample_stream());
        assert_eq!(views.find_by_status(GoalStatus::Blocked).unwrap().len(), 1);
        assert!(views.find_by_status(GoalStatus::Doing).unwrap().is_empty());
    }
}
