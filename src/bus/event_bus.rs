use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::event::IntegrationEvent;
use crate::inbox::{InboxEntry, InboxError, InboxStore};
use crate::options::DeliveryOptions;
use crate::serializer::EventSerializer;

use super::subscriber::{EventSubscriber, HandlerError};

/// Error type for publish operations.
#[derive(Debug)]
pub enum PublishError {
    /// A subscriber returned an error. Subscribers after it were not invoked.
    Subscriber {
        subscriber: String,
        event_id: Uuid,
        source: HandlerError,
    },
    /// The inbox ledger failed.
    Inbox(InboxError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Subscriber {
                subscriber,
                event_id,
                source,
            } => write!(
                f,
                "subscriber {} failed for event {}: {}",
                subscriber, event_id, source
            ),
            PublishError::Inbox(err) => write!(f, "inbox error: {}", err),
        }
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PublishError::Subscriber { source, .. } => Some(source.as_ref()),
            PublishError::Inbox(err) => Some(err),
        }
    }
}

impl From<InboxError> for PublishError {
    fn from(err: InboxError) -> Self {
        PublishError::Inbox(err)
    }
}

struct Subscription {
    name: String,
    event_type: &'static str,
    invoke: Box<dyn Fn(&dyn IntegrationEvent) -> Result<(), HandlerError> + Send + Sync>,
}

/// In-process publish/subscribe fan-out with idempotent-subscriber semantics.
///
/// Subscribers register against concrete event types; the registry is built
/// once at startup and is immutable afterwards (wrap the bus in an `Arc` and
/// share it). Publishing an event with no subscribers succeeds silently.
///
/// On failure, publishing stops at the first erring subscriber: earlier
/// subscribers are already recorded in the inbox and will be skipped when the
/// dispatcher retries; the failing subscriber and those after it run on the
/// next attempt. This abort-on-first-failure sequencing is a simplification
/// chosen for the sequential dispatch model, not an ordering guarantee
/// subscribers may rely on.
pub struct EventBus {
    subscriptions: HashMap<TypeId, Vec<Subscription>>,
    inbox: Arc<dyn InboxStore>,
    inbox_enabled: bool,
    serializer: Option<Arc<EventSerializer>>,
}

impl EventBus {
    pub fn new(inbox: Arc<dyn InboxStore>) -> Self {
        EventBus {
            subscriptions: HashMap::new(),
            inbox,
            inbox_enabled: true,
            serializer: None,
        }
    }

    /// Toggle the inbox idempotency guard. When disabled, neither the
    /// skip-check nor the success record runs, and subscribers may be invoked
    /// more than once per event.
    pub fn with_inbox_enabled(mut self, enabled: bool) -> Self {
        self.inbox_enabled = enabled;
        self
    }

    /// Apply the delivery options that concern the bus. Currently that is the
    /// inbox toggle, so a bus and a dispatcher built from the same options
    /// agree on idempotency behavior.
    pub fn with_options(mut self, options: &DeliveryOptions) -> Self {
        self.inbox_enabled = options.enable_inbox;
        self
    }

    /// Attach the serializer so inbox ledger rows carry the registered type
    /// tag instead of the Rust type path. Without one, rows fall back to the
    /// fully-qualified type name.
    pub fn with_serializer(mut self, serializer: Arc<EventSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Register a subscriber for events of type `E`.
    ///
    /// Subscribers are invoked in registration order.
    pub fn subscribe<E, H>(&mut self, handler: H)
    where
        E: IntegrationEvent,
        H: EventSubscriber<E> + 'static,
    {
        let name = handler.name().to_string();
        self.push_subscription::<E>(
            name,
            Box::new(move |event| match event.as_any().downcast_ref::<E>() {
                Some(event) => handler.handle(event),
                None => Err("subscriber invoked with mismatched event type".into()),
            }),
        );
    }

    /// Register a closure subscriber under an explicit name.
    pub fn subscribe_fn<E, F>(&mut self, name: impl Into<String>, handler: F)
    where
        E: IntegrationEvent,
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.push_subscription::<E>(
            name.into(),
            Box::new(move |event| match event.as_any().downcast_ref::<E>() {
                Some(event) => handler(event),
                None => Err("subscriber invoked with mismatched event type".into()),
            }),
        );
    }

    fn push_subscription<E: IntegrationEvent>(
        &mut self,
        name: String,
        invoke: Box<dyn Fn(&dyn IntegrationEvent) -> Result<(), HandlerError> + Send + Sync>,
    ) {
        self.subscriptions
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Subscription {
                name,
                event_type: type_name::<E>(),
                invoke,
            });
    }

    /// Number of subscribers registered for `E`.
    pub fn subscriber_count<E: IntegrationEvent>(&self) -> usize {
        self.subscriptions
            .get(&TypeId::of::<E>())
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Publish a single event to its subscribers.
    ///
    /// Resolves the subscribers registered for the event's concrete type,
    /// skips any the inbox says already processed it, invokes the rest in
    /// registration order, and records each success in the inbox. The first
    /// subscriber error aborts the remainder and propagates to the caller.
    pub fn publish(&self, event: &dyn IntegrationEvent) -> Result<(), PublishError> {
        let Some(subscriptions) = self.subscriptions.get(&event.as_any().type_id()) else {
            // A silently-unobserved event is not an error.
            return Ok(());
        };

        let event_type = self
            .serializer
            .as_ref()
            .and_then(|serializer| serializer.type_tag_for(event.as_any().type_id()));

        for subscription in subscriptions {
            if self.inbox_enabled && self.inbox.has_processed(event.id(), &subscription.name)? {
                continue;
            }

            (subscription.invoke)(event).map_err(|source| PublishError::Subscriber {
                subscriber: subscription.name.clone(),
                event_id: event.id(),
                source,
            })?;

            if self.inbox_enabled {
                self.inbox.mark_processed(InboxEntry {
                    event_id: event.id(),
                    handler_name: subscription.name.clone(),
                    event_type: event_type.unwrap_or(subscription.event_type).to_string(),
                    tenant_id: event.tenant_id().map(str::to_string),
                    processed_on_utc: SystemTime::now(),
                })?;
            }
        }

        Ok(())
    }

    /// Publish a sequence of events one at a time, short-circuiting on the
    /// first failure. Events after the failing one are not published.
    pub fn publish_all<'a, I>(&self, events: I) -> Result<(), PublishError>
    where
        I: IntoIterator<Item = &'a dyn IntegrationEvent>,
    {
        self.publish_all_with(&CancelToken::new(), events)
    }

    /// Publish a sequence of events, honoring cancellation between events.
    ///
    /// A cancelled token stops the batch cleanly before the next event; the
    /// event in flight always finishes its fan-out, matching how the
    /// dispatcher honors cancellation between entries. Unpublished events are
    /// not an error.
    pub fn publish_all_with<'a, I>(&self, cancel: &CancelToken, events: I) -> Result<(), PublishError>
    where
        I: IntoIterator<Item = &'a dyn IntegrationEvent>,
    {
        for event in events {
            if cancel.is_cancelled() {
                break;
            }
            self.publish(event)?;
        }
        Ok(())
    }
}
