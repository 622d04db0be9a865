// error.rs — Storage-layer error type shared by the store ports.

use thiserror::Error;

/// Errors raised by the event store, claim store, and view store ports.
///
/// Adapters map their backend failures into [`StoreError::Backend`] so the
/// domain layer never depends on a concrete storage crate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to serialize or deserialize an event or record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage backend rejected or failed the operation.
    #[error("storage error: {0}")]
    Backend(String),
}
