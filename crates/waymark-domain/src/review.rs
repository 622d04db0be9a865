// review.rs — QA turn gate: bounded review retries derived from history.
//
// The turn count is never stored anywhere. It is recomputed from the
// goal's event stream on every check, so it cannot drift from the source
// of truth even when every cache is stale.

use waymark_events::EventRecord;

/// Budgeted review turns for a goal.
#[derive(Debug, Clone, Copy)]
pub struct TurnGate {
    limit: u32,
}

impl TurnGate {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// How many review turns the stream has recorded.
    pub fn current_turn(history: &[EventRecord]) -> u32 {
        history
            .iter()
            .filter(|r| r.event_type == "goal_reviewed")
            .count() as u32
    }

    /// Turns left in the budget. Saturating: recorded reviews beyond the
    /// limit never produce a negative remainder.
    pub fn remaining_turns(&self, current: u32) -> u32 {
        self.limit.saturating_sub(current)
    }

    /// The budget is exhausted — completion must commit.
    pub fn should_auto_commit(&self, current: u32) -> bool {
        current >= self.limit
    }
}

/// What `finish` did: committed the goal, or spent one QA turn.
#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    /// The goal was completed (explicit commit, or the turn budget ran
    /// out and completion auto-committed).
    Completed { version: u32 },
    /// QA mode: one review turn was recorded instead of completing.
    ReviewRecorded {
        turn: u32,
        remaining: u32,
        prompt: String,
    },
}

/// The prompt handed back to the agent when a QA turn is recorded.
pub fn review_prompt(objective: &str, remaining: u32) -> String {
    format!(
        "Review the work against the goal's success criteria before committing: {objective}. \
         {remaining} review turn(s) remaining; pass --commit to finish."
    )
}
