// error.rs — Error taxonomy for goal lifecycle operations.
//
// Everything here propagates unchanged to the caller: the core performs no
// retries and no silent recovery. The only system-level repair path is a
// full projection rebuild from event history (see rebuild.rs).

use chrono::{DateTime, Utc};
use thiserror::Error;

use waymark_events::StoreError;

use crate::rules::Violations;

/// Errors raised by aggregates, validation rules, the claim policy, and
/// the command handlers.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Command targets an aggregate the read model has never seen.
    #[error("goal not found: {0}")]
    NotFound(String),

    /// `add` on an aggregate whose stream already has events.
    #[error("goal {0} is already defined")]
    AlreadyDefined(String),

    /// A lifecycle guard was violated. The message names the current
    /// status so the caller can explain what went wrong.
    #[error("{0}")]
    InvalidStateTransition(String),

    /// One or more field checks failed (length, count, requiredness).
    #[error("{0}")]
    InvalidInput(Violations),

    /// Another worker holds an unexpired claim on the goal. The expiry is
    /// included so callers can tell the user when the lease frees up.
    #[error("goal {goal_id} is claimed by {claimed_by} until {claim_expires_at}")]
    ClaimedByAnotherWorker {
        goal_id: String,
        claimed_by: String,
        claim_expires_at: DateTime<Utc>,
    },

    /// An update carried no fields at all.
    #[error("no changes provided")]
    NoChangesProvided,

    /// A stream contained an event tag outside the closed set. Replay
    /// fails loudly rather than silently dropping history.
    #[error("unknown event type '{event_type}' at version {version}")]
    UnknownEventType { event_type: String, version: u32 },

    /// Storage-layer failure from one of the ports.
    #[error(transparent)]
    Store(#[from] StoreError),
}
