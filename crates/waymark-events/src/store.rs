// store.rs — Event store port and the in-memory implementation.
//
// The event log is append-only and conceptually per-aggregate: reads are
// always "the whole stream, oldest first". A global sequence orders events
// across streams for projection rebuilds.

use std::sync::Mutex;

use crate::envelope::{AppendResult, EventRecord};
use crate::error::StoreError;

/// Append-only event storage.
///
/// `append` does NOT verify that the record's version immediately follows
/// the stream head. Two processes that rehydrate the same head can both
/// append "their" version N+1, producing duplicate or mis-ordered versions
/// in the stream. The goal claim lease is the cooperative mitigation;
/// callers that bypass it get no protection. Existing logs may depend on
/// this lenient contract, so adapters must not add a compare-and-swap.
pub trait EventStore: Send + Sync {
    /// Append one event, returning the store-assigned global sequence.
    fn append(&self, record: &EventRecord) -> Result<AppendResult, StoreError>;

    /// Read an aggregate's full stream, oldest first. Unknown ids return
    /// an empty vec, not an error.
    fn read_stream(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, StoreError>;

    /// Distinct stream ids, in order of first appearance. Used by
    /// projection rebuilds to enumerate every stream.
    fn aggregate_ids(&self) -> Result<Vec<String>, StoreError>;
}

/// In-process event store used by tests and by callers that want replay
/// semantics without a database.
#[derive(Default)]
pub struct MemoryEventStore {
    records: Mutex<Vec<EventRecord>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of appended events across all streams.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for MemoryEventStore {
    fn append(&self, record: &EventRecord) -> Result<AppendResult, StoreError> {
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(AppendResult {
            next_seq: records.len() as u64,
        })
    }

    fn read_stream(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    fn aggregate_ids(&self) -> Result<Vec<String>, StoreError> {
        let records = self.records.lock().unwrap();
        let mut ids = Vec::new();
        for record in records.iter() {
            if !ids.contains(&record.aggregate_id) {
                ids.push(record.aggregate_id.clone());
            }
        }
        Ok(ids)
    }
}
