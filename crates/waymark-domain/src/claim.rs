// claim.rs — Advisory claim (lease) for cross-process coordination.
//
// N independent worker processes contend for the same goal without a lock
// service: whoever stores a claim first owns the goal until the lease
// expires or is released. The lease is cooperative — nothing prevents a
// caller from mutating state around it. Only the command handlers consult
// it, which is the entire enforcement story.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use waymark_events::StoreError;

/// One worker's lease on one goal. At most one claim per goal exists at a
/// time (the store upserts by goal id). Claims live in a side table and
/// are never derived from the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub goal_id: String,
    pub claimed_by: String,
    pub claimed_at: DateTime<Utc>,
    pub claim_expires_at: DateTime<Utc>,
}

/// Keyed claim storage. Upsert semantics: `set_claim` replaces whatever
/// claim the goal currently has.
pub trait ClaimStore: Send + Sync {
    fn get_claim(&self, goal_id: &str) -> Result<Option<Claim>, StoreError>;
    fn set_claim(&self, claim: &Claim) -> Result<(), StoreError>;
    fn release_claim(&self, goal_id: &str) -> Result<(), StoreError>;
}

/// In-process claim store for tests.
#[derive(Default)]
pub struct MemoryClaimStore {
    claims: Mutex<HashMap<String, Claim>>,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClaimStore for MemoryClaimStore {
    fn get_claim(&self, goal_id: &str) -> Result<Option<Claim>, StoreError> {
        Ok(self.claims.lock().unwrap().get(goal_id).cloned())
    }

    fn set_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        self.claims
            .lock()
            .unwrap()
            .insert(claim.goal_id.clone(), claim.clone());
        Ok(())
    }

    fn release_claim(&self, goal_id: &str) -> Result<(), StoreError> {
        self.claims.lock().unwrap().remove(goal_id);
        Ok(())
    }
}

/// Outcome of a claim check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimDecision {
    Allowed,
    /// Another worker holds an unexpired lease; the existing claim is
    /// returned so the caller can report when it frees up.
    Denied { existing: Claim },
}

/// Pure lease arithmetic. "Now" is always passed in — the policy never
/// reads a clock, so expiry behavior is deterministic under test.
#[derive(Debug, Clone, Copy)]
pub struct ClaimPolicy {
    duration_minutes: i64,
}

impl ClaimPolicy {
    pub fn new(duration_minutes: i64) -> Self {
        Self { duration_minutes }
    }

    /// May `worker_id` take (or keep) the goal?
    ///
    /// Allowed when there is no claim, when the existing claim expired
    /// strictly before `now`, or when the existing claim already belongs
    /// to `worker_id`. A claim expiring exactly at `now` still holds.
    pub fn can_claim(
        &self,
        existing: Option<&Claim>,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> ClaimDecision {
        match existing {
            None => ClaimDecision::Allowed,
            Some(claim) if claim.claim_expires_at < now => ClaimDecision::Allowed,
            Some(claim) if claim.claimed_by == worker_id => ClaimDecision::Allowed,
            Some(claim) => ClaimDecision::Denied {
                existing: claim.clone(),
            },
        }
    }

    /// Compute a fresh lease starting at `now`. Nothing is persisted;
    /// the caller decides whether to store it.
    pub fn refreshed_claim(&self, goal_id: &str, worker_id: &str, now: DateTime<Utc>) -> Claim {
        Claim {
            goal_id: goal_id.into(),
            claimed_by: worker_id.into(),
            claimed_at: now,
            claim_expires_at: now + Duration::minutes(self.duration_minutes),
        }
    }
}
