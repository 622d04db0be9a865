// bus.rs — Synchronous publish/subscribe keyed by event-type string.
//
// Publishing happens after the event is durably appended. There is no
// redelivery: if a subscriber fails, the caller sees the error and the
// read model is stale until a full rebuild. Subscribers must therefore be
// idempotent and safe to re-run from an empty read model.

use std::collections::HashMap;
use std::sync::Arc;

use crate::envelope::EventRecord;
use crate::error::StoreError;

/// A bus subscriber, typically a projector patching a read-model row.
pub trait Subscriber: Send + Sync {
    /// Handle one published event.
    fn handle(&self, record: &EventRecord) -> Result<(), StoreError>;
}

/// In-process dispatch of appended events to read-model subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<String, Vec<Arc<dyn Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for one event type.
    pub fn subscribe(&mut self, event_type: impl Into<String>, subscriber: Arc<dyn Subscriber>) {
        self.subscribers
            .entry(event_type.into())
            .or_default()
            .push(subscriber);
    }

    /// Register one subscriber for several event types at once.
    pub fn subscribe_all(&mut self, event_types: &[&str], subscriber: Arc<dyn Subscriber>) {
        for event_type in event_types {
            self.subscribe(*event_type, Arc::clone(&subscriber));
        }
    }

    /// Dispatch an event to every subscriber registered for its type, in
    /// registration order. The first subscriber error aborts dispatch and
    /// propagates: the event is already durable, so the caller must learn
    /// that the read model did not keep up.
    pub fn publish(&self, record: &EventRecord) -> Result<(), StoreError> {
        let Some(subscribers) = self.subscribers.get(&record.event_type) else {
            tracing::debug!(event_type = %record.event_type, "no subscribers");
            return Ok(());
        };
        for subscriber in subscribers {
            subscriber.handle(record)?;
        }
        Ok(())
    }
}
