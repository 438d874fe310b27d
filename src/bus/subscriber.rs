use std::any::type_name;
use std::error::Error;

use crate::event::IntegrationEvent;

/// Error returned by a subscriber. Treated as transient by the dispatcher:
/// the owning outbox entry is retried until the retry ceiling is reached.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// A subscriber for one concrete event type.
///
/// The subscriber's [`name`](EventSubscriber::name) is its identity in the
/// inbox ledger; it defaults to the implementing type's fully-qualified name
/// and must stay stable across process restarts for idempotency to hold.
pub trait EventSubscriber<E: IntegrationEvent>: Send + Sync {
    /// Stable identity of this subscriber in the inbox ledger.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Handle the event. Must be safe to skip on redelivery once it has
    /// returned `Ok` (the inbox guarantees it will be).
    fn handle(&self, event: &E) -> Result<(), HandlerError>;
}
