// goal.rs — The Goal aggregate: a pure lifecycle state machine.
//
// A goal's state is fully derived from its ordered event stream. Command
// methods validate against current state, emit exactly one event (or
// none), and fold it into state via `apply`. Any validation failure means
// no mutation and no event — all-or-nothing per invocation.
//
// Lifecycle:
//   to-do → doing → {blocked, paused, in-review} → … → completed
//   with `reset` back to to-do and a `removed` tombstone orthogonal to
//   status. The full guard matrix lives on the individual commands.
//
// Commands take `now` as an argument: the aggregate never reads a clock,
// so replay is deterministic — same history, same state, every time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waymark_events::EventRecord;

use crate::claim::Claim;
use crate::error::DomainError;
use crate::goal_events::{
    AddedPayload, BlockedPayload, EmptyPayload, GoalContext, GoalEvent, PausedPayload,
    ResumedPayload, ReviewedPayload, StartedPayload, UnblockedPayload, UpdatedPayload,
};
use crate::rules::{self, Checks};

/// Maximum length for objective and note text.
pub const MAX_TEXT_LEN: usize = 500;
/// Maximum length for a pause reason.
pub const MAX_REASON_LEN: usize = 200;
/// Maximum entries in success criteria, scope lists, and boundaries.
pub const MAX_LIST_ITEMS: usize = 25;
/// Maximum length of a single list entry.
pub const MAX_ITEM_LEN: usize = 300;

/// Lifecycle status of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalStatus {
    ToDo,
    Doing,
    Blocked,
    Paused,
    InReview,
    Qualified,
    Completed,
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GoalStatus::ToDo => "to-do",
            GoalStatus::Doing => "doing",
            GoalStatus::Blocked => "blocked",
            GoalStatus::Paused => "paused",
            GoalStatus::InReview => "in-review",
            GoalStatus::Qualified => "qualified",
            GoalStatus::Completed => "completed",
        };
        write!(f, "{name}")
    }
}

impl GoalStatus {
    /// Parse the kebab-case status name (as shown by `Display`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "to-do" => Some(GoalStatus::ToDo),
            "doing" => Some(GoalStatus::Doing),
            "blocked" => Some(GoalStatus::Blocked),
            "paused" => Some(GoalStatus::Paused),
            "in-review" => Some(GoalStatus::InReview),
            "qualified" => Some(GoalStatus::Qualified),
            "completed" => Some(GoalStatus::Completed),
            _ => None,
        }
    }
}

/// Input for `add`: everything captured when a goal is defined.
#[derive(Debug, Clone, Default)]
pub struct AddGoal {
    pub objective: String,
    pub success_criteria: Vec<String>,
    pub scope_in: Vec<String>,
    pub scope_out: Vec<String>,
    pub boundaries: Vec<String>,
    pub note: Option<String>,
    pub context: Option<GoalContext>,
}

/// Input for `update`: only provided fields change; `None` means "leave
/// the field alone" (goals have no clear-on-update semantics).
#[derive(Debug, Clone, Default)]
pub struct GoalPatch {
    pub objective: Option<String>,
    pub success_criteria: Option<Vec<String>>,
    pub scope_in: Option<Vec<String>>,
    pub scope_out: Option<Vec<String>>,
    pub boundaries: Option<Vec<String>>,
    pub note: Option<String>,
}

impl GoalPatch {
    pub fn is_empty(&self) -> bool {
        self.objective.is_none()
            && self.success_criteria.is_none()
            && self.scope_in.is_none()
            && self.scope_out.is_none()
            && self.boundaries.is_none()
            && self.note.is_none()
    }
}

/// The Goal aggregate. State is owned exclusively by `apply`; nothing else
/// mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub objective: String,
    pub success_criteria: Vec<String>,
    pub scope_in: Vec<String>,
    pub scope_out: Vec<String>,
    pub boundaries: Vec<String>,
    pub status: GoalStatus,
    /// Stream position of the last applied event; 0 before `add`.
    pub version: u32,
    pub note: Option<String>,
    pub context: Option<GoalContext>,
    /// Echo of the lease carried by the latest start/resume event. The
    /// claim table is authoritative; this is what the stream knows.
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claim_expires_at: Option<DateTime<Utc>>,
    /// Tombstone, orthogonal to status.
    pub removed: bool,
}

impl Goal {
    /// The zero state: what every rehydration starts from.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            objective: String::new(),
            success_criteria: Vec::new(),
            scope_in: Vec::new(),
            scope_out: Vec::new(),
            boundaries: Vec::new(),
            status: GoalStatus::ToDo,
            version: 0,
            note: None,
            context: None,
            claimed_by: None,
            claimed_at: None,
            claim_expires_at: None,
            removed: false,
        }
    }

    /// Replay an ordered event stream from the zero state. Pure and
    /// deterministic: same history, same final state.
    pub fn rehydrate(id: &str, history: &[EventRecord]) -> Result<Self, DomainError> {
        let mut goal = Goal::new(id);
        for record in history {
            let event = GoalEvent::from_record(record)?;
            goal.apply(&event);
            goal.version = record.version;
        }
        Ok(goal)
    }

    // ---- commands -------------------------------------------------------

    /// Define the goal. Only valid on a fresh stream (version 0).
    pub fn add(&mut self, input: AddGoal, now: DateTime<Utc>) -> Result<EventRecord, DomainError> {
        if self.version != 0 {
            return Err(DomainError::AlreadyDefined(self.id.clone()));
        }

        let mut checks = Checks::new();
        checks.expect(
            !input.objective.trim().is_empty(),
            "objective",
            "Objective is required",
        );
        checks.max_len("objective", "Objective", &input.objective, MAX_TEXT_LEN);
        checks.max_items(
            "successCriteria",
            "Success criteria",
            input.success_criteria.len(),
            MAX_LIST_ITEMS,
        );
        checks.each_max_len(
            "successCriteria",
            "success criteria",
            &input.success_criteria,
            MAX_ITEM_LEN,
        );
        checks.max_items("scopeIn", "Scope-in", input.scope_in.len(), MAX_LIST_ITEMS);
        checks.each_max_len("scopeIn", "scope-in", &input.scope_in, MAX_ITEM_LEN);
        checks.max_items("scopeOut", "Scope-out", input.scope_out.len(), MAX_LIST_ITEMS);
        checks.each_max_len("scopeOut", "scope-out", &input.scope_out, MAX_ITEM_LEN);
        checks.max_items(
            "boundaries",
            "Boundaries",
            input.boundaries.len(),
            MAX_LIST_ITEMS,
        );
        checks.each_max_len("boundaries", "boundaries", &input.boundaries, MAX_ITEM_LEN);
        if let Some(note) = &input.note {
            checks.max_len("note", "Note", note, MAX_TEXT_LEN);
        }
        checks.into_result()?;

        let context = input.context.filter(|c| !c.is_empty());
        self.seal(
            GoalEvent::Added(AddedPayload {
                objective: input.objective,
                success_criteria: input.success_criteria,
                scope_in: input.scope_in,
                scope_out: input.scope_out,
                boundaries: input.boundaries,
                note: input.note,
                context,
            }),
            now,
        )
    }

    /// Begin (or re-affirm) work under the given claim. Idempotent on
    /// `doing`: a fresh `goal_started` is emitted and status stays put.
    pub fn start(&mut self, claim: &Claim, now: DateTime<Utc>) -> Result<EventRecord, DomainError> {
        match self.status {
            GoalStatus::Completed => {
                return Err(DomainError::InvalidStateTransition(
                    "Goal is already completed".into(),
                ))
            }
            GoalStatus::ToDo | GoalStatus::Doing => {}
            current => return Err(rules::invalid_transition("start", current)),
        }

        self.seal(
            GoalEvent::Started(StartedPayload {
                claimed_by: claim.claimed_by.clone(),
                claimed_at: claim.claimed_at,
                claim_expires_at: claim.claim_expires_at,
            }),
            now,
        )
    }

    /// Patch the provided fields. An all-absent patch is an error for
    /// goals (`NoChangesProvided`) — unlike projects, which no-op.
    pub fn update(
        &mut self,
        patch: GoalPatch,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, DomainError> {
        rules::transition(
            "update",
            self.status,
            &[GoalStatus::ToDo, GoalStatus::Doing, GoalStatus::Blocked],
        )?;

        if patch.is_empty() {
            return Err(DomainError::NoChangesProvided);
        }

        let mut checks = Checks::new();
        if let Some(objective) = &patch.objective {
            checks.expect(
                !objective.trim().is_empty(),
                "objective",
                "Objective is required",
            );
            checks.max_len("objective", "Objective", objective, MAX_TEXT_LEN);
        }
        if let Some(criteria) = &patch.success_criteria {
            checks.max_items(
                "successCriteria",
                "Success criteria",
                criteria.len(),
                MAX_LIST_ITEMS,
            );
            checks.each_max_len("successCriteria", "success criteria", criteria, MAX_ITEM_LEN);
        }
        if let Some(scope_in) = &patch.scope_in {
            checks.max_items("scopeIn", "Scope-in", scope_in.len(), MAX_LIST_ITEMS);
            checks.each_max_len("scopeIn", "scope-in", scope_in, MAX_ITEM_LEN);
        }
        if let Some(scope_out) = &patch.scope_out {
            checks.max_items("scopeOut", "Scope-out", scope_out.len(), MAX_LIST_ITEMS);
            checks.each_max_len("scopeOut", "scope-out", scope_out, MAX_ITEM_LEN);
        }
        if let Some(boundaries) = &patch.boundaries {
            checks.max_items("boundaries", "Boundaries", boundaries.len(), MAX_LIST_ITEMS);
            checks.each_max_len("boundaries", "boundaries", boundaries, MAX_ITEM_LEN);
        }
        if let Some(note) = &patch.note {
            checks.max_len("note", "Note", note, MAX_TEXT_LEN);
        }
        checks.into_result()?;

        self.seal(
            GoalEvent::Updated(UpdatedPayload {
                objective: patch.objective,
                success_criteria: patch.success_criteria,
                scope_in: patch.scope_in,
                scope_out: patch.scope_out,
                boundaries: patch.boundaries,
                note: patch.note,
            }),
            now,
        )
    }

    /// Mark the goal blocked. The note explaining the blocker is required.
    pub fn block(&mut self, note: &str, now: DateTime<Utc>) -> Result<EventRecord, DomainError> {
        rules::transition("block", self.status, &[GoalStatus::ToDo, GoalStatus::Doing])?;

        let mut checks = Checks::new();
        checks.expect(
            !note.trim().is_empty(),
            "note",
            "Note is required when blocking a goal",
        );
        checks.max_len("note", "Note", note, MAX_TEXT_LEN);
        checks.into_result()?;

        self.seal(
            GoalEvent::Blocked(BlockedPayload { note: note.into() }),
            now,
        )
    }

    /// Clear the blocker and go back to work.
    pub fn unblock(
        &mut self,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, DomainError> {
        rules::transition("unblock", self.status, &[GoalStatus::Blocked])?;

        let mut checks = Checks::new();
        if let Some(note) = &note {
            checks.max_len("note", "Note", note, MAX_TEXT_LEN);
        }
        checks.into_result()?;

        self.seal(GoalEvent::Unblocked(UnblockedPayload { note }), now)
    }

    /// Set the goal aside with a reason.
    pub fn pause(
        &mut self,
        reason: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, DomainError> {
        rules::transition("pause", self.status, &[GoalStatus::Doing])?;

        let mut checks = Checks::new();
        checks.expect(
            !reason.trim().is_empty(),
            "reason",
            "Reason is required when pausing a goal",
        );
        checks.max_len("reason", "Reason", reason, MAX_REASON_LEN);
        if let Some(note) = &note {
            checks.max_len("note", "Note", note, MAX_TEXT_LEN);
        }
        checks.into_result()?;

        self.seal(
            GoalEvent::Paused(PausedPayload {
                reason: reason.into(),
                note,
            }),
            now,
        )
    }

    /// Pick a paused goal back up under a refreshed claim.
    pub fn resume(
        &mut self,
        note: Option<String>,
        claim: &Claim,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, DomainError> {
        rules::transition("resume", self.status, &[GoalStatus::Paused])?;

        let mut checks = Checks::new();
        if let Some(note) = &note {
            checks.max_len("note", "Note", note, MAX_TEXT_LEN);
        }
        checks.into_result()?;

        self.seal(
            GoalEvent::Resumed(ResumedPayload {
                note,
                claimed_by: claim.claimed_by.clone(),
                claimed_at: claim.claimed_at,
                claim_expires_at: claim.claim_expires_at,
            }),
            now,
        )
    }

    /// Finish the goal. Legal from `doing` and `blocked`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<EventRecord, DomainError> {
        match self.status {
            GoalStatus::ToDo => {
                return Err(DomainError::InvalidStateTransition(
                    "Goal has not been started".into(),
                ))
            }
            GoalStatus::Completed => {
                return Err(DomainError::InvalidStateTransition(
                    "Goal is already completed".into(),
                ))
            }
            GoalStatus::Doing | GoalStatus::Blocked => {}
            current => return Err(rules::invalid_transition("complete", current)),
        }

        self.seal(GoalEvent::Completed(EmptyPayload {}), now)
    }

    /// Send the goal back to `to-do`. Blocked goals cannot be reset, so a
    /// blocker note is never silently discarded.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Result<EventRecord, DomainError> {
        match self.status {
            GoalStatus::Blocked => {
                return Err(DomainError::InvalidStateTransition(
                    "Cannot reset a blocked goal".into(),
                ))
            }
            GoalStatus::Doing | GoalStatus::Completed => {}
            current => return Err(rules::invalid_transition("reset", current)),
        }

        self.seal(GoalEvent::Reset(EmptyPayload {}), now)
    }

    /// Hand the goal to QA review.
    pub fn submit_for_review(&mut self, now: DateTime<Utc>) -> Result<EventRecord, DomainError> {
        rules::transition("submit", self.status, &[GoalStatus::Doing])?;
        self.seal(GoalEvent::SubmittedForReview(EmptyPayload {}), now)
    }

    /// Mark a reviewed goal as qualified.
    pub fn qualify(&mut self, now: DateTime<Utc>) -> Result<EventRecord, DomainError> {
        rules::transition("qualify", self.status, &[GoalStatus::InReview])?;
        self.seal(GoalEvent::Qualified(EmptyPayload {}), now)
    }

    /// Tombstone the goal. Always allowed; status is left as-is.
    pub fn remove(&mut self, now: DateTime<Utc>) -> Result<EventRecord, DomainError> {
        self.seal(GoalEvent::Removed(EmptyPayload {}), now)
    }

    /// Record one QA review turn. Does not change status; the turn count
    /// is always recomputed from the stream, never stored.
    pub fn record_review(
        &mut self,
        turn_number: u32,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, DomainError> {
        let mut checks = Checks::new();
        checks.expect(
            turn_number >= 1,
            "turnNumber",
            "Turn number must be at least 1",
        );
        checks.into_result()?;

        self.seal(GoalEvent::Reviewed(ReviewedPayload { turn_number }), now)
    }

    // ---- event application ---------------------------------------------

    /// Assign the next version, fold the event into state, and return the
    /// sealed envelope. Only called after every validation passed.
    fn seal(&mut self, event: GoalEvent, now: DateTime<Utc>) -> Result<EventRecord, DomainError> {
        let record = event.into_record(&self.id, self.version + 1, now)?;
        self.apply(&event);
        self.version = record.version;
        Ok(record)
    }

    /// Fold one event into state. Exhaustive over the closed tag set;
    /// never fails, never reads a clock.
    pub fn apply(&mut self, event: &GoalEvent) {
        match event {
            GoalEvent::Added(p) => {
                self.objective = p.objective.clone();
                self.success_criteria = p.success_criteria.clone();
                self.scope_in = p.scope_in.clone();
                self.scope_out = p.scope_out.clone();
                self.boundaries = p.boundaries.clone();
                self.note = p.note.clone();
                self.context = p.context.clone();
                self.status = GoalStatus::ToDo;
            }
            GoalEvent::Started(p) => {
                self.status = GoalStatus::Doing;
                self.claimed_by = Some(p.claimed_by.clone());
                self.claimed_at = Some(p.claimed_at);
                self.claim_expires_at = Some(p.claim_expires_at);
            }
            GoalEvent::Updated(p) => {
                if let Some(objective) = &p.objective {
                    self.objective = objective.clone();
                }
                if let Some(criteria) = &p.success_criteria {
                    self.success_criteria = criteria.clone();
                }
                if let Some(scope_in) = &p.scope_in {
                    self.scope_in = scope_in.clone();
                }
                if let Some(scope_out) = &p.scope_out {
                    self.scope_out = scope_out.clone();
                }
                if let Some(boundaries) = &p.boundaries {
                    self.boundaries = boundaries.clone();
                }
                if let Some(note) = &p.note {
                    self.note = Some(note.clone());
                }
            }
            GoalEvent::Blocked(p) => {
                self.status = GoalStatus::Blocked;
                self.note = Some(p.note.clone());
            }
            GoalEvent::Unblocked(p) => {
                self.status = GoalStatus::Doing;
                if let Some(note) = &p.note {
                    self.note = Some(note.clone());
                }
            }
            GoalEvent::Paused(p) => {
                self.status = GoalStatus::Paused;
                if let Some(note) = &p.note {
                    self.note = Some(note.clone());
                }
                self.clear_claim_echo();
            }
            GoalEvent::Resumed(p) => {
                self.status = GoalStatus::Doing;
                if let Some(note) = &p.note {
                    self.note = Some(note.clone());
                }
                self.claimed_by = Some(p.claimed_by.clone());
                self.claimed_at = Some(p.claimed_at);
                self.claim_expires_at = Some(p.claim_expires_at);
            }
            GoalEvent::Completed(_) => {
                self.status = GoalStatus::Completed;
                self.clear_claim_echo();
            }
            GoalEvent::Reset(_) => {
                self.status = GoalStatus::ToDo;
            }
            GoalEvent::SubmittedForReview(_) => {
                self.status = GoalStatus::InReview;
            }
            GoalEvent::Qualified(_) => {
                self.status = GoalStatus::Qualified;
            }
            GoalEvent::Removed(_) => {
                self.removed = true;
                self.clear_claim_echo();
            }
            GoalEvent::Reviewed(_) => {
                // Review turns live in the stream; state is untouched.
            }
        }
    }

    fn clear_claim_echo(&mut self) {
        self.claimed_by = None;
        self.claimed_at = None;
        self.claim_expires_at = None;
    }
}
