// rebuild.rs — Rebuild goal views from the full event log.
//
// The bus has no redelivery: an append that succeeded while publish
// failed leaves the read model behind the log. Replaying every stream
// into a cleared view store from empty state is the one repair path, and
// it is safe precisely because the projector is idempotent and a pure
// function of event history.

use std::sync::Arc;

use waymark_events::{EventStore, Subscriber};

use crate::error::DomainError;
use crate::projection::{GoalProjector, GoalViewStore};

/// Clear the view store and replay every stream through the projector.
/// Returns the number of events replayed.
pub fn rebuild_views(
    events: &dyn EventStore,
    views: Arc<dyn GoalViewStore>,
) -> Result<usize, DomainError> {
    views.clear()?;
    let projector = GoalProjector::new(views);

    let mut replayed = 0;
    for id in events.aggregate_ids()? {
        for record in events.read_stream(&id)? {
            projector.handle(&record)?;
            replayed += 1;
        }
    }
    tracing::info!(replayed, "goal views rebuilt from event log");
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use waymark_events::MemoryEventStore;

    use crate::claim::Claim;
    use crate::goal::{AddGoal, Goal, GoalStatus};
    use crate::projection::MemoryGoalViews;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    fn claim(goal_id: &str) -> Claim {
        Claim {
            goal_id: goal_id.into(),
            claimed_by: "worker-a".into(),
            claimed_at: t0(),
            claim_expires_at: t0() + chrono::Duration::minutes(30),
        }
    }

    #[test]
    fn rebuild_recovers_views_from_scratch() {
        let events = MemoryEventStore::new();

        // Two goals appended straight to the store — as if every publish
        // had failed and the views never saw a single event.
        let mut g1 = Goal::new("g1");
        events
            .append(
                &g1.add(
                    AddGoal {
                        objective: "First".into(),
                        ..Default::default()
                    },
                    t0(),
                )
                .unwrap(),
            )
            .unwrap();
        events.append(&g1.start(&claim("g1"), t0()).unwrap()).unwrap();

        let mut g2 = Goal::new("g2");
        events
            .append(
                &g2.add(
                    AddGoal {
                        objective: "Second".into(),
                        ..Default::default()
                    },
                    t0(),
                )
                .unwrap(),
            )
            .unwrap();

        let views = Arc::new(MemoryGoalViews::new());
        let replayed =
            rebuild_views(&events, Arc::clone(&views) as Arc<dyn GoalViewStore>).unwrap();
        assert_eq!(replayed, 3);

        let v1 = views.find_by_id("g1").unwrap().unwrap();
        assert_eq!(v1.status, GoalStatus::Doing);
        assert_eq!(v1.version, 2);
        assert_eq!(views.find_by_id("g2").unwrap().unwrap().objective, "Second");
    }

    #[test]
    fn rebuild_discards_stale_rows() {
        let events = MemoryEventStore::new();
        let mut g1 = Goal::new("g1");
        events
            .append(
                &g1.add(
                    AddGoal {
                        objective: "Only goal".into(),
                        ..Default::default()
                    },
                    t0(),
                )
                .unwrap(),
            )
            .unwrap();

        let views = Arc::new(MemoryGoalViews::new());
        // A row for a goal the log knows nothing about (drifted state).
        views
            .upsert(&crate::projection::GoalViewPatch {
                id: "phantom".into(),
                version: 9,
                updated_at: t0(),
                objective: Some("stale".into()),
                status: Some(GoalStatus::Doing),
                note: crate::patch::Patch::Keep,
                claimed_by: crate::patch::Patch::Keep,
            })
            .unwrap();

        rebuild_views(&events, Arc::clone(&views) as Arc<dyn GoalViewStore>).unwrap();

        assert!(views.find_by_id("phantom").unwrap().is_none());
        assert!(views.find_by_id("g1").unwrap().is_some());
    }
}
