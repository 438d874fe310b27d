//! Reliable event delivery: transactional outbox, idempotent inbox, and an
//! in-process event bus.
//!
//! A business operation writes its data and an outbox entry in the same
//! transactional scope; an external scheduler periodically runs the
//! dispatcher, which drains pending entries oldest-first, reconstructs each
//! event through the type-tag registry, and fans it out to subscribers. The
//! inbox ledger makes at-least-once delivery safe: a subscriber that already
//! handled an event is skipped on redelivery. Failed entries accumulate a
//! retry counter and are dead-lettered at the ceiling; undeserializable
//! payloads are dead-lettered immediately.

mod bus;
mod cancel;
mod event;
mod inbox;
mod options;
mod outbox;
mod serializer;

pub use bus::{EventBus, EventSubscriber, HandlerError, PublishError};
pub use cancel::CancelToken;
pub use event::{EventContext, EventMetadata, HasEventMetadata, IntegrationEvent};
pub use inbox::{InMemoryInboxStore, InboxEntry, InboxError, InboxStore};
pub use options::{DeliveryOptions, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES};
pub use outbox::{
    DispatchResult, InMemoryOutboxStore, Outbox, OutboxDispatcher, OutboxEntry, OutboxError,
    OutboxStore,
};
pub use serializer::{EventSerializer, SerializedEvent, SerializerError};
