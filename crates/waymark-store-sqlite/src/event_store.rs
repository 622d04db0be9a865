// event_store.rs — SQLite-backed append-only event log.
//
// Append inserts one row and reports the rowid as the global sequence.
// There is no expected-version check on insert: the (aggregate_id,
// version) index is not unique, per the event store contract. Racing
// workers that both rehydrated the same head will both land their rows.

use chrono::{DateTime, Utc};
use rusqlite::params;

use waymark_events::{AppendResult, EventRecord, EventStore, StoreError};

use crate::{backend_err, SharedConnection};

/// The event log adapter.
pub struct SqliteEventStore {
    conn: SharedConnection,
}

impl SqliteEventStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("bad timestamp '{raw}': {e}")))
}

impl EventStore for SqliteEventStore {
    fn append(&self, record: &EventRecord) -> Result<AppendResult, StoreError> {
        let payload = serde_json::to_string(&record.payload)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO events (event_type, aggregate_id, version, timestamp, payload) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.event_type,
                record.aggregate_id,
                record.version,
                record.timestamp.to_rfc3339(),
                payload,
            ],
        )
        .map_err(backend_err)?;

        Ok(AppendResult {
            next_seq: conn.last_insert_rowid() as u64,
        })
    }

    fn read_stream(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT event_type, aggregate_id, version, timestamp, payload \
                 FROM events WHERE aggregate_id = ?1 ORDER BY seq",
            )
            .map_err(backend_err)?;

        let rows = stmt
            .query_map(params![aggregate_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(backend_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (event_type, aggregate_id, version, timestamp, payload) =
                row.map_err(backend_err)?;
            records.push(EventRecord {
                event_type,
                aggregate_id,
                version,
                timestamp: parse_timestamp(&timestamp)?,
                payload: serde_json::from_str(&payload)?,
            });
        }
        Ok(records)
    }

    fn aggregate_ids(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT aggregate_id FROM events GROUP BY aggregate_id ORDER BY MIN(seq)")
            .map_err(backend_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(backend_err)?;

        let mut ids = Vec::new();
        for id in rows {
            ids.push(id.map_err(backend_err)?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::open_in_memory;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    fn record(aggregate_id: &str, version: u32, event_type: &str) -> EventRecord {
        EventRecord::new(
            event_type,
            aggregate_id,
            version,
            t0(),
            serde_json::json!({"note": "n"}),
        )
    }

    #[test]
    fn append_then_read_round_trips() {
        let store = SqliteEventStore::new(open_in_memory().unwrap());
        let appended = store.append(&record("g1", 1, "goal_added")).unwrap();
        assert_eq!(appended.next_seq, 1);

        let stream = store.read_stream("g1").unwrap();
        assert_eq!(stream.len(), 1);
        assert_eq!(stream[0].event_type, "goal_added");
        assert_eq!(stream[0].version, 1);
        assert_eq!(stream[0].timestamp, t0());
        assert_eq!(stream[0].payload["note"], "n");
    }

    #[test]
    fn streams_are_isolated_and_ordered() {
        let store = SqliteEventStore::new(open_in_memory().unwrap());
        store.append(&record("g1", 1, "goal_added")).unwrap();
        store.append(&record("g2", 1, "goal_added")).unwrap();
        store.append(&record("g1", 2, "goal_started")).unwrap();

        let stream = store.read_stream("g1").unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream[1].event_type, "goal_started");

        assert!(store.read_stream("unknown").unwrap().is_empty());
        assert_eq!(store.aggregate_ids().unwrap(), vec!["g1", "g2"]);
    }

    #[test]
    fn duplicate_versions_are_accepted() {
        // The lenient append contract: no unique constraint on
        // (aggregate_id, version).
        let store = SqliteEventStore::new(open_in_memory().unwrap());
        store.append(&record("g1", 1, "goal_added")).unwrap();
        store.append(&record("g1", 2, "goal_started")).unwrap();
        store.append(&record("g1", 2, "goal_started")).unwrap();
        assert_eq!(store.read_stream("g1").unwrap().len(), 3);
    }

    #[test]
    fn events_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waymark.db");

        {
            let store = SqliteEventStore::new(crate::open_database(&path).unwrap());
            store.append(&record("g1", 1, "goal_added")).unwrap();
        }

        let store = SqliteEventStore::new(crate::open_database(&path).unwrap());
        assert_eq!(store.read_stream("g1").unwrap().len(), 1);
    }
}
