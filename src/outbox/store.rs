use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::event::IntegrationEvent;
use crate::serializer::{EventSerializer, SerializerError};

use super::entry::OutboxEntry;

/// Error type for outbox operations.
#[derive(Debug)]
pub enum OutboxError {
    LockPoisoned(&'static str),
    /// An entry with this id already exists.
    DuplicateEntry(Uuid),
    /// A `mark_*` call referenced an entry the store does not hold.
    NotFound(Uuid),
    /// The event could not be serialized at `add` time. Propagates to the
    /// business caller: the accompanying write must not proceed without its
    /// event durably queued.
    Serialization(SerializerError),
}

impl fmt::Display for OutboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboxError::LockPoisoned(operation) => {
                write!(f, "outbox lock poisoned during {}", operation)
            }
            OutboxError::DuplicateEntry(id) => write!(f, "duplicate outbox entry {}", id),
            OutboxError::NotFound(id) => write!(f, "outbox entry {} not found", id),
            OutboxError::Serialization(err) => write!(f, "failed to serialize event: {}", err),
        }
    }
}

impl Error for OutboxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OutboxError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SerializerError> for OutboxError {
    fn from(err: SerializerError) -> Self {
        OutboxError::Serialization(err)
    }
}

/// Durable queue of not-yet-dispatched events.
///
/// The store is the sole writer of its entries. Implementations must
/// serialize writes for the same id at the storage layer; no claim or lease
/// semantics are required (the delivered guarantee is at-least-once, with the
/// inbox suppressing duplicates).
pub trait OutboxStore: Send + Sync {
    /// Persist a new entry. Callable within the same transactional scope as
    /// the business write it accompanies.
    fn add(&self, entry: OutboxEntry) -> Result<(), OutboxError>;

    /// Up to `batch_size` entries that are neither processed nor dead,
    /// ascending by creation time (oldest first). Empty when nothing is
    /// pending; emptiness is never an error.
    fn pending_batch(&self, batch_size: usize) -> Result<Vec<OutboxEntry>, OutboxError>;

    /// Set `processed_on_utc` to now. First write wins; calling it again is a
    /// no-op.
    fn mark_processed(&self, id: Uuid) -> Result<(), OutboxError>;

    /// Record a failed dispatch attempt: increment `retry_count`, overwrite
    /// `last_error`, and set `is_dead` if the caller decided the retry
    /// ceiling is reached. Never decrements the counter or clears the flag.
    fn mark_failed(&self, id: Uuid, error: &str, is_dead: bool) -> Result<(), OutboxError>;

    /// Dead-letter an entry for a permanent error (e.g. an undeserializable
    /// payload). Sets `is_dead` and `last_error` without touching
    /// `retry_count`.
    fn mark_dead(&self, id: Uuid, error: &str) -> Result<(), OutboxError>;
}

impl<S: OutboxStore + ?Sized> OutboxStore for Arc<S> {
    fn add(&self, entry: OutboxEntry) -> Result<(), OutboxError> {
        (**self).add(entry)
    }

    fn pending_batch(&self, batch_size: usize) -> Result<Vec<OutboxEntry>, OutboxError> {
        (**self).pending_batch(batch_size)
    }

    fn mark_processed(&self, id: Uuid) -> Result<(), OutboxError> {
        (**self).mark_processed(id)
    }

    fn mark_failed(&self, id: Uuid, error: &str, is_dead: bool) -> Result<(), OutboxError> {
        (**self).mark_failed(id, error, is_dead)
    }

    fn mark_dead(&self, id: Uuid, error: &str) -> Result<(), OutboxError> {
        (**self).mark_dead(id, error)
    }
}

/// Front door for the business-write path: serializes an event and enqueues
/// the resulting entry.
pub struct Outbox<S> {
    store: S,
    serializer: Arc<EventSerializer>,
}

impl<S> Outbox<S> {
    pub fn new(store: S, serializer: Arc<EventSerializer>) -> Self {
        Outbox { store, serializer }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: OutboxStore> Outbox<S> {
    /// Serialize the event and persist a new pending entry for it.
    ///
    /// Failures propagate synchronously to the caller; the business write
    /// accompanying this call cannot safely proceed without its event queued.
    pub fn add<E>(&self, event: &E) -> Result<(), OutboxError>
    where
        E: IntegrationEvent + Serialize,
    {
        let serialized = self.serializer.serialize(event)?;
        self.store.add(OutboxEntry::new(event, serialized))
    }

    /// Enqueue several events of the same type, stopping at the first
    /// failure.
    pub fn add_all<'a, E, I>(&self, events: I) -> Result<(), OutboxError>
    where
        E: IntegrationEvent + Serialize + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        for event in events {
            self.add(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventMetadata, HasEventMetadata};
    use crate::outbox::InMemoryOutboxStore;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct InvoiceIssued {
        #[serde(flatten)]
        meta: EventMetadata,
        amount: u64,
    }

    impl HasEventMetadata for InvoiceIssued {
        fn event_metadata(&self) -> &EventMetadata {
            &self.meta
        }
    }

    #[test]
    fn add_serializes_and_enqueues() {
        let mut serializer = EventSerializer::new();
        serializer.register::<InvoiceIssued>();
        let store = InMemoryOutboxStore::new();
        let outbox = Outbox::new(store.clone(), Arc::new(serializer));

        let event = InvoiceIssued {
            meta: EventMetadata::stamp(),
            amount: 1200,
        };
        outbox.add(&event).unwrap();

        let entry = store.get(event.id()).unwrap();
        assert!(entry.is_pending());
        assert!(entry.payload.contains("1200"));
        assert!(entry.event_type.ends_with("InvoiceIssued"));
    }

    #[test]
    fn add_with_unregistered_type_propagates_to_the_caller() {
        let outbox = Outbox::new(InMemoryOutboxStore::new(), Arc::new(EventSerializer::new()));
        let event = InvoiceIssued {
            meta: EventMetadata::stamp(),
            amount: 1,
        };
        let err = outbox.add(&event).unwrap_err();
        assert!(matches!(err, OutboxError::Serialization(_)));
    }

    #[test]
    fn add_all_enqueues_in_order() {
        let mut serializer = EventSerializer::new();
        serializer.register::<InvoiceIssued>();
        let store = InMemoryOutboxStore::new();
        let outbox = Outbox::new(store.clone(), Arc::new(serializer));

        let events: Vec<InvoiceIssued> = (0..3)
            .map(|amount| InvoiceIssued {
                meta: EventMetadata::stamp(),
                amount,
            })
            .collect();
        outbox.add_all(&events).unwrap();

        let batch = store.pending_batch(10).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].id, events[0].id());
        assert_eq!(batch[2].id, events[2].id());
    }
}
