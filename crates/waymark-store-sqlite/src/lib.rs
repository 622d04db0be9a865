//! # waymark-store-sqlite
//!
//! SQLite adapters behind Waymark's storage ports: the append-only event
//! log, the advisory claim table, and the goal read model. One database
//! file holds all three; the adapters share a single WAL-mode connection.
//!
//! The schema is embedded and applied idempotently on every open, so a
//! fresh database and an existing one go through the same path.

pub mod claim_store;
pub mod event_store;
pub mod view_store;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use waymark_events::StoreError;

pub use claim_store::SqliteClaimStore;
pub use event_store::SqliteEventStore;
pub use view_store::SqliteGoalViews;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// A connection shared by the adapters of one process invocation.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Map a rusqlite failure into the port error type.
pub(crate) fn backend_err(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Open (or create) the Waymark database, enable WAL mode, and apply the
/// schema idempotently.
pub fn open_database(path: impl AsRef<Path>) -> Result<SharedConnection, StoreError> {
    let conn = Connection::open(path.as_ref()).map_err(backend_err)?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(backend_err)?;
    conn.execute_batch(SCHEMA_SQL).map_err(backend_err)?;
    tracing::debug!(path = %path.as_ref().display(), "database opened");
    Ok(Arc::new(Mutex::new(conn)))
}

/// In-memory database for tests that want real SQL without a file.
pub fn open_in_memory() -> Result<SharedConnection, StoreError> {
    let conn = Connection::open_in_memory().map_err(backend_err)?;
    conn.execute_batch(SCHEMA_SQL).map_err(backend_err)?;
    Ok(Arc::new(Mutex::new(conn)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_the_schema() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_database(dir.path().join("waymark.db")).unwrap();

        let count: i64 = conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('events', 'claims', 'goal_views')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn reopening_an_existing_database_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waymark.db");
        drop(open_database(&path).unwrap());
        drop(open_database(&path).unwrap());
    }
}
