// claim_store.rs — SQLite-backed advisory claim table.
//
// One row per goal, replaced wholesale on every set. The table carries no
// notion of expiry enforcement; the claim policy interprets the stored
// timestamps.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use waymark_domain::{Claim, ClaimStore};
use waymark_events::StoreError;

use crate::{backend_err, SharedConnection};

/// The claim table adapter.
pub struct SqliteClaimStore {
    conn: SharedConnection,
}

impl SqliteClaimStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("bad timestamp '{raw}': {e}")))
}

impl ClaimStore for SqliteClaimStore {
    fn get_claim(&self, goal_id: &str) -> Result<Option<Claim>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT goal_id, claimed_by, claimed_at, claim_expires_at \
                 FROM claims WHERE goal_id = ?1",
                params![goal_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(backend_err)?;

        match row {
            None => Ok(None),
            Some((goal_id, claimed_by, claimed_at, claim_expires_at)) => Ok(Some(Claim {
                goal_id,
                claimed_by,
                claimed_at: parse_timestamp(&claimed_at)?,
                claim_expires_at: parse_timestamp(&claim_expires_at)?,
            })),
        }
    }

    fn set_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO claims (goal_id, claimed_by, claimed_at, claim_expires_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                claim.goal_id,
                claim.claimed_by,
                claim.claimed_at.to_rfc3339(),
                claim.claim_expires_at.to_rfc3339(),
            ],
        )
        .map_err(backend_err)?;
        Ok(())
    }

    fn release_claim(&self, goal_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM claims WHERE goal_id = ?1", params![goal_id])
            .map_err(backend_err)?;
        Ok(())
    }
}
