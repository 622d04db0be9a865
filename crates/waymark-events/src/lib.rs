//! # waymark-events
//!
//! Event plumbing for Waymark: the durable event envelope, the event store
//! port, the synchronous publish/subscribe bus, and the clock port.
//!
//! Everything in Waymark that changes state does so by appending an
//! [`EventRecord`] to an [`EventStore`] stream and publishing it on an
//! [`EventBus`]. Aggregates in `waymark-domain` own the semantics; this
//! crate owns the wire shape and the ports.
//!
//! ## Key components
//!
//! - [`EventRecord`] — the immutable `{type, aggregateId, version,
//!   timestamp, payload}` envelope, bit-exact across the log's lifetime
//! - [`EventStore`] — append / ordered stream read / stream enumeration
//! - [`EventBus`] — synchronous dispatch keyed by event-type string
//! - [`Clock`] — the single injected source of "now"

pub mod bus;
pub mod clock;
pub mod envelope;
pub mod error;
pub mod store;

pub use bus::{EventBus, Subscriber};
pub use clock::{Clock, FixedClock, SystemClock};
pub use envelope::{AppendResult, EventRecord};
pub use error::StoreError;
pub use store::{EventStore, MemoryEventStore};
