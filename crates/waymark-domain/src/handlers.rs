// handlers.rs — Command orchestration for goals.
//
// Every mutating use case runs the same shape:
//
//   1. cheap existence pre-check against the read model (NotFound)
//   2. claim check (ClaimedByAnotherWorker)
//   3. authoritative replay: read_stream + rehydrate — the projection is
//      never trusted for mutation decisions, only for pre-checks
//   4. invoke the aggregate command (validation failures pass through)
//   5. append the event (skipped when the command emitted none)
//   6. publish on the bus, which patches the read model synchronously
//   7. store or release the claim where the command calls for it
//   8. return a minimal receipt
//
// There are no retries anywhere in this pipeline. If append succeeds and
// publish fails, the log is durable and the view is stale; `rebuild`
// replays the full log into fresh views to repair that.

use std::sync::Arc;

use serde::Serialize;

use waymark_events::{Clock, EventBus, EventRecord, EventStore};

use crate::claim::{Claim, ClaimDecision, ClaimPolicy, ClaimStore};
use crate::error::DomainError;
use crate::goal::{AddGoal, Goal, GoalPatch, GoalStatus};
use crate::goal_events::GoalEvent;
use crate::projection::{GoalProjector, GoalView, GoalViewStore};
use crate::review::{self, FinishOutcome, TurnGate};

/// Minimal result of a mutating command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalReceipt {
    pub id: String,
    pub version: u32,
    pub status: GoalStatus,
}

impl GoalReceipt {
    fn of(goal: &Goal) -> Self {
        Self {
            id: goal.id.clone(),
            version: goal.version,
            status: goal.status,
        }
    }
}

/// Read-side report for one goal: the view row plus claim and turn budget.
#[derive(Debug, Clone, Serialize)]
pub struct GoalReport {
    pub view: GoalView,
    pub claim: Option<Claim>,
    pub current_turn: u32,
    pub remaining_turns: u32,
    pub turn_limit: u32,
}

/// Command handlers over the storage ports. One instance per process
/// invocation; within an invocation everything is strictly synchronous.
pub struct GoalService {
    events: Arc<dyn EventStore>,
    views: Arc<dyn GoalViewStore>,
    claims: Arc<dyn ClaimStore>,
    bus: EventBus,
    policy: ClaimPolicy,
    gate: TurnGate,
    clock: Arc<dyn Clock>,
}

impl GoalService {
    /// Wire the service and subscribe the goal projector for every goal
    /// event type, so each append is mirrored into the read model before
    /// the command returns.
    pub fn new(
        events: Arc<dyn EventStore>,
        views: Arc<dyn GoalViewStore>,
        claims: Arc<dyn ClaimStore>,
        policy: ClaimPolicy,
        gate: TurnGate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut bus = EventBus::new();
        bus.subscribe_all(
            GoalEvent::TYPES,
            Arc::new(GoalProjector::new(Arc::clone(&views))),
        );
        Self {
            events,
            views,
            claims,
            bus,
            policy,
            gate,
            clock,
        }
    }

    // ---- mutating commands ---------------------------------------------

    /// Define a new goal.
    pub fn add(&self, id: &str, input: AddGoal) -> Result<GoalReceipt, DomainError> {
        if self.views.find_by_id(id)?.is_some() {
            return Err(DomainError::AlreadyDefined(id.to_string()));
        }

        let mut goal = self.rehydrate(id)?;
        let record = goal.add(input, self.clock.now())?;
        self.commit(&record)?;
        Ok(GoalReceipt::of(&goal))
    }

    /// Start work on a goal and take (or refresh) its claim.
    pub fn start(&self, id: &str, worker: &str) -> Result<GoalReceipt, DomainError> {
        let now = self.clock.now();
        self.ensure_exists(id)?;
        self.ensure_claimable(id, worker, now)?;

        let mut goal = self.rehydrate(id)?;
        let claim = self.policy.refreshed_claim(id, worker, now);
        let record = goal.start(&claim, now)?;
        self.commit(&record)?;
        self.claims.set_claim(&claim)?;
        Ok(GoalReceipt::of(&goal))
    }

    /// Patch the provided fields of a goal.
    pub fn update(
        &self,
        id: &str,
        worker: &str,
        patch: GoalPatch,
    ) -> Result<GoalReceipt, DomainError> {
        self.mutate(id, worker, |goal, now| goal.update(patch, now))
    }

    /// Block a goal on an obstacle.
    pub fn block(&self, id: &str, worker: &str, note: &str) -> Result<GoalReceipt, DomainError> {
        self.mutate(id, worker, |goal, now| goal.block(note, now))
    }

    /// Clear a goal's blocker.
    pub fn unblock(
        &self,
        id: &str,
        worker: &str,
        note: Option<String>,
    ) -> Result<GoalReceipt, DomainError> {
        self.mutate(id, worker, |goal, now| goal.unblock(note, now))
    }

    /// Pause a goal and release its claim.
    pub fn pause(
        &self,
        id: &str,
        worker: &str,
        reason: &str,
        note: Option<String>,
    ) -> Result<GoalReceipt, DomainError> {
        let receipt = self.mutate(id, worker, |goal, now| goal.pause(reason, note, now))?;
        self.claims.release_claim(id)?;
        Ok(receipt)
    }

    /// Resume a paused goal under a refreshed claim.
    pub fn resume(
        &self,
        id: &str,
        worker: &str,
        note: Option<String>,
    ) -> Result<GoalReceipt, DomainError> {
        let now = self.clock.now();
        self.ensure_exists(id)?;
        self.ensure_claimable(id, worker, now)?;

        let mut goal = self.rehydrate(id)?;
        let claim = self.policy.refreshed_claim(id, worker, now);
        let record = goal.resume(note, &claim, now)?;
        self.commit(&record)?;
        self.claims.set_claim(&claim)?;
        Ok(GoalReceipt::of(&goal))
    }

    /// Complete a goal directly and release its claim.
    pub fn complete(&self, id: &str, worker: &str) -> Result<GoalReceipt, DomainError> {
        let receipt = self.mutate(id, worker, |goal, now| goal.complete(now))?;
        self.claims.release_claim(id)?;
        Ok(receipt)
    }

    /// QA-gated completion. Defaults to recording a review turn and
    /// handing back the remaining budget; completes when `--commit` was
    /// passed or the turn budget is exhausted (auto-commit).
    pub fn finish(
        &self,
        id: &str,
        worker: &str,
        commit_requested: bool,
    ) -> Result<FinishOutcome, DomainError> {
        let now = self.clock.now();
        self.ensure_exists(id)?;
        self.ensure_claimable(id, worker, now)?;

        // One stream read serves both the turn count and the rehydration;
        // the count is always derived from the authoritative stream.
        let history = self.events.read_stream(id)?;
        let mut goal = Goal::rehydrate(id, &history)?;
        let current = TurnGate::current_turn(&history);

        if commit_requested || self.gate.should_auto_commit(current) {
            let record = goal.complete(now)?;
            self.commit(&record)?;
            self.claims.release_claim(id)?;
            return Ok(FinishOutcome::Completed {
                version: goal.version,
            });
        }

        let turn = current + 1;
        let record = goal.record_review(turn, now)?;
        self.commit(&record)?;
        let remaining = self.gate.remaining_turns(turn);
        Ok(FinishOutcome::ReviewRecorded {
            turn,
            remaining,
            prompt: review::review_prompt(&goal.objective, remaining),
        })
    }

    /// Send a goal back to to-do.
    pub fn reset(&self, id: &str, worker: &str) -> Result<GoalReceipt, DomainError> {
        self.mutate(id, worker, |goal, now| goal.reset(now))
    }

    /// Hand a goal to QA review.
    pub fn submit_for_review(&self, id: &str, worker: &str) -> Result<GoalReceipt, DomainError> {
        self.mutate(id, worker, |goal, now| goal.submit_for_review(now))
    }

    /// Qualify a reviewed goal.
    pub fn qualify(&self, id: &str, worker: &str) -> Result<GoalReceipt, DomainError> {
        self.mutate(id, worker, |goal, now| goal.qualify(now))
    }

    /// Tombstone a goal and release its claim.
    pub fn remove(&self, id: &str, worker: &str) -> Result<GoalReceipt, DomainError> {
        let receipt = self.mutate(id, worker, |goal, now| goal.remove(now))?;
        self.claims.release_claim(id)?;
        Ok(receipt)
    }

    /// Record one QA review turn without touching status.
    pub fn record_review(
        &self,
        id: &str,
        worker: &str,
        turn_number: u32,
    ) -> Result<GoalReceipt, DomainError> {
        self.mutate(id, worker, |goal, now| goal.record_review(turn_number, now))
    }

    // ---- read side ------------------------------------------------------

    /// The view row plus the claim and turn budget for one goal.
    pub fn show(&self, id: &str) -> Result<GoalReport, DomainError> {
        let view = self
            .views
            .find_by_id(id)?
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;
        let claim = self.claims.get_claim(id)?;
        let history = self.events.read_stream(id)?;
        let current_turn = TurnGate::current_turn(&history);
        Ok(GoalReport {
            view,
            claim,
            current_turn,
            remaining_turns: self.gate.remaining_turns(current_turn),
            turn_limit: self.gate.limit(),
        })
    }

    /// List views, optionally filtered by status.
    pub fn list(&self, status: Option<GoalStatus>) -> Result<Vec<GoalView>, DomainError> {
        let views = match status {
            Some(status) => self.views.find_by_status(status)?,
            None => self.views.list()?,
        };
        Ok(views)
    }

    // ---- pipeline pieces -----------------------------------------------

    fn ensure_exists(&self, id: &str) -> Result<(), DomainError> {
        if self.views.find_by_id(id)?.is_none() {
            return Err(DomainError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn ensure_claimable(
        &self,
        id: &str,
        worker: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), DomainError> {
        let existing = self.claims.get_claim(id)?;
        if let ClaimDecision::Denied { existing } =
            self.policy.can_claim(existing.as_ref(), worker, now)
        {
            return Err(DomainError::ClaimedByAnotherWorker {
                goal_id: id.to_string(),
                claimed_by: existing.claimed_by,
                claim_expires_at: existing.claim_expires_at,
            });
        }
        Ok(())
    }

    fn rehydrate(&self, id: &str) -> Result<Goal, DomainError> {
        let history = self.events.read_stream(id)?;
        Goal::rehydrate(id, &history)
    }

    /// The standard mutation pipeline for commands without claim upkeep.
    fn mutate<F>(&self, id: &str, worker: &str, command: F) -> Result<GoalReceipt, DomainError>
    where
        F: FnOnce(&mut Goal, chrono::DateTime<chrono::Utc>) -> Result<EventRecord, DomainError>,
    {
        let now = self.clock.now();
        self.ensure_exists(id)?;
        self.ensure_claimable(id, worker, now)?;

        let mut goal = self.rehydrate(id)?;
        let record = command(&mut goal, now)?;
        self.commit(&record)?;
        Ok(GoalReceipt::of(&goal))
    }

    /// Append, then publish. Publish failures surface to the caller: the
    /// event is durable but the read model missed it.
    fn commit(&self, record: &EventRecord) -> Result<(), DomainError> {
        let appended = self.events.append(record)?;
        tracing::debug!(
            seq = appended.next_seq,
            event_type = %record.event_type,
            aggregate_id = %record.aggregate_id,
            version = record.version,
            "event appended"
        );
        self.bus.publish(record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    use waymark_events::{FixedClock, MemoryEventStore};

    use crate::claim::MemoryClaimStore;
    use crate::projection::MemoryGoalViews;

    struct Fixture {
        service: GoalService,
        events: Arc<MemoryEventStore>,
        views: Arc<MemoryGoalViews>,
        claims: Arc<MemoryClaimStore>,
        clock: Arc<FixedClock>,
    }

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    fn fixture_with_limit(turn_limit: u32) -> Fixture {
        let events = Arc::new(MemoryEventStore::new());
        let views = Arc::new(MemoryGoalViews::new());
        let claims = Arc::new(MemoryClaimStore::new());
        let clock = Arc::new(FixedClock::new(t0()));
        let service = GoalService::new(
            Arc::clone(&events) as Arc<dyn EventStore>,
            Arc::clone(&views) as Arc<dyn GoalViewStore>,
            Arc::clone(&claims) as Arc<dyn ClaimStore>,
            ClaimPolicy::new(30),
            TurnGate::new(turn_limit),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Fixture {
            service,
            events,
            views,
            claims,
            clock,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_limit(3)
    }

    fn add_goal(fx: &Fixture, id: &str) {
        fx.service
            .add(
                id,
                AddGoal {
                    objective: "Ship the tracker".into(),
                    success_criteria: vec!["tests pass".into()],
                    ..Default::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn add_appends_publishes_and_projects() {
        let fx = fixture();
        add_goal(&fx, "g1");

        assert_eq!(fx.events.len(), 1);
        let view = fx.views.find_by_id("g1").unwrap().unwrap();
        assert_eq!(view.status, GoalStatus::ToDo);
        assert_eq!(view.version, 1);
    }

    #[test]
    fn add_duplicate_id_is_already_defined() {
        let fx = fixture();
        add_goal(&fx, "g1");
        let err = fx
            .service
            .add(
                "g1",
                AddGoal {
                    objective: "Again".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyDefined(_)));
        assert_eq!(fx.events.len(), 1);
    }

    #[test]
    fn mutating_a_missing_goal_is_not_found() {
        let fx = fixture();
        let err = fx.service.start("ghost", "worker-a").unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn start_stores_a_claim() {
        let fx = fixture();
        add_goal(&fx, "g1");

        let receipt = fx.service.start("g1", "worker-a").unwrap();
        assert_eq!(receipt.status, GoalStatus::Doing);
        assert_eq!(receipt.version, 2);

        let claim = fx.claims.get_claim("g1").unwrap().unwrap();
        assert_eq!(claim.claimed_by, "worker-a");
        assert_eq!(claim.claim_expires_at, t0() + Duration::minutes(30));
    }

    #[test]
    fn live_claim_blocks_other_workers() {
        let fx = fixture();
        add_goal(&fx, "g1");
        fx.service.start("g1", "worker-a").unwrap();

        let err = fx.service.block("g1", "worker-b", "stuck").unwrap_err();
        match err {
            DomainError::ClaimedByAnotherWorker {
                claimed_by,
                claim_expires_at,
                ..
            } => {
                assert_eq!(claimed_by, "worker-a");
                assert_eq!(claim_expires_at, t0() + Duration::minutes(30));
            }
            other => panic!("expected ClaimedByAnotherWorker, got {other}"),
        }
    }

    #[test]
    fn expired_claim_can_be_taken_over() {
        let fx = fixture();
        add_goal(&fx, "g1");
        fx.service.start("g1", "worker-a").unwrap();

        // The lease runs out; worker B takes over.
        fx.clock.advance(Duration::minutes(31));
        let receipt = fx.service.start("g1", "worker-b").unwrap();
        assert_eq!(receipt.status, GoalStatus::Doing);
        assert_eq!(
            fx.claims.get_claim("g1").unwrap().unwrap().claimed_by,
            "worker-b"
        );
    }

    #[test]
    fn complete_releases_the_claim() {
        let fx = fixture();
        add_goal(&fx, "g1");
        fx.service.start("g1", "worker-a").unwrap();
        fx.service.complete("g1", "worker-a").unwrap();

        assert!(fx.claims.get_claim("g1").unwrap().is_none());
        let view = fx.views.find_by_id("g1").unwrap().unwrap();
        assert_eq!(view.status, GoalStatus::Completed);
    }

    #[test]
    fn pause_releases_and_resume_restores_the_claim() {
        let fx = fixture();
        add_goal(&fx, "g1");
        fx.service.start("g1", "worker-a").unwrap();

        fx.service
            .pause("g1", "worker-a", "handoff", None)
            .unwrap();
        assert!(fx.claims.get_claim("g1").unwrap().is_none());

        fx.clock.advance(Duration::minutes(5));
        fx.service.resume("g1", "worker-b", None).unwrap();
        let claim = fx.claims.get_claim("g1").unwrap().unwrap();
        assert_eq!(claim.claimed_by, "worker-b");
        assert_eq!(claim.claimed_at, t0() + Duration::minutes(5));
    }

    #[test]
    fn update_failure_appends_nothing() {
        let fx = fixture();
        add_goal(&fx, "g1");
        let before = fx.events.len();

        let err = fx
            .service
            .update("g1", "worker-a", GoalPatch::default())
            .unwrap_err();
        assert!(matches!(err, DomainError::NoChangesProvided));
        assert_eq!(fx.events.len(), before);
    }

    #[test]
    fn remove_deletes_the_view_so_later_commands_are_not_found() {
        let fx = fixture();
        add_goal(&fx, "g1");
        fx.service.remove("g1", "worker-a").unwrap();

        assert!(fx.views.find_by_id("g1").unwrap().is_none());
        let err = fx.service.start("g1", "worker-a").unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn finish_records_review_turns_until_commit() {
        let fx = fixture_with_limit(2);
        add_goal(&fx, "g1");
        fx.service.start("g1", "worker-a").unwrap();

        let outcome = fx.service.finish("g1", "worker-a", false).unwrap();
        match outcome {
            FinishOutcome::ReviewRecorded {
                turn,
                remaining,
                prompt,
            } => {
                assert_eq!(turn, 1);
                assert_eq!(remaining, 1);
                assert!(prompt.contains("Ship the tracker"));
            }
            other => panic!("expected ReviewRecorded, got {other:?}"),
        }

        // Status is untouched by a review turn.
        let view = fx.views.find_by_id("g1").unwrap().unwrap();
        assert_eq!(view.status, GoalStatus::Doing);
    }

    #[test]
    fn finish_auto_commits_when_the_budget_runs_out() {
        let fx = fixture_with_limit(2);
        add_goal(&fx, "g1");
        fx.service.start("g1", "worker-a").unwrap();

        fx.service.finish("g1", "worker-a", false).unwrap();
        fx.service.finish("g1", "worker-a", false).unwrap();

        // Two turns recorded; the budget is spent, so the third finish
        // completes even without --commit.
        let outcome = fx.service.finish("g1", "worker-a", false).unwrap();
        assert!(matches!(outcome, FinishOutcome::Completed { .. }));
        assert_eq!(
            fx.views.find_by_id("g1").unwrap().unwrap().status,
            GoalStatus::Completed
        );
        assert!(fx.claims.get_claim("g1").unwrap().is_none());
    }

    #[test]
    fn finish_with_commit_completes_immediately() {
        let fx = fixture();
        add_goal(&fx, "g1");
        fx.service.start("g1", "worker-a").unwrap();

        let outcome = fx.service.finish("g1", "worker-a", true).unwrap();
        assert!(matches!(outcome, FinishOutcome::Completed { version: 3 }));
    }

    #[test]
    fn show_reports_claim_and_turn_budget() {
        let fx = fixture();
        add_goal(&fx, "g1");
        fx.service.start("g1", "worker-a").unwrap();
        fx.service.record_review("g1", "worker-a", 1).unwrap();

        let report = fx.service.show("g1").unwrap();
        assert_eq!(report.view.status, GoalStatus::Doing);
        assert_eq!(report.claim.unwrap().claimed_by, "worker-a");
        assert_eq!(report.current_turn, 1);
        assert_eq!(report.remaining_turns, 2);
        assert_eq!(report.turn_limit, 3);
    }

    #[test]
    fn list_filters_by_status() {
        let fx = fixture();
        add_goal(&fx, "g1");
        add_goal(&fx, "g2");
        fx.service.start("g2", "worker-a").unwrap();

        assert_eq!(fx.service.list(None).unwrap().len(), 2);
        let doing = fx.service.list(Some(GoalStatus::Doing)).unwrap();
        assert_eq!(doing.len(), 1);
        assert_eq!(doing[0].id, "g2");
    }

    #[test]
    fn validation_errors_pass_through_unchanged() {
        let fx = fixture();
        add_goal(&fx, "g1");
        fx.service.start("g1", "worker-a").unwrap();

        let err = fx.service.block("g1", "worker-a", "").unwrap_err();
        assert_eq!(err.to_string(), "Note is required when blocking a goal");
    }
}
