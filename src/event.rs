use std::any::Any;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Contract every integration event must satisfy.
///
/// An integration event is an immutable fact describing something that
/// happened, identified once at creation and never mutated afterwards. The
/// trait is object-safe so erased events can flow from the serializer through
/// the dispatcher to the bus without knowing the concrete type.
pub trait IntegrationEvent: Any + Send + Sync {
    /// Globally unique identifier, assigned at creation.
    fn id(&self) -> Uuid;

    /// When the event occurred, UTC.
    fn occurred_on_utc(&self) -> SystemTime;

    /// Tenant the event belongs to, if any.
    fn tenant_id(&self) -> Option<&str>;

    /// Correlation identifier linking the event to the operation that
    /// produced it, if any.
    fn correlation_id(&self) -> Option<&str>;

    /// Upcast for concrete-type dispatch in the bus.
    fn as_any(&self) -> &dyn Any;
}

/// The identity, timestamp, tenant, and correlation fields shared by every
/// integration event.
///
/// Embed it in concrete events with `#[serde(flatten)]` and implement
/// [`HasEventMetadata`]; the blanket impl then provides [`IntegrationEvent`].
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct OrderPlaced {
///     #[serde(flatten)]
///     meta: EventMetadata,
///     order_id: String,
/// }
///
/// impl HasEventMetadata for OrderPlaced {
///     fn event_metadata(&self) -> &EventMetadata {
///         &self.meta
///     }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub id: Uuid,
    pub occurred_on_utc: SystemTime,
    pub tenant_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl EventMetadata {
    /// Stamp fresh metadata: a new id and the current time, no tenant or
    /// correlation. Prefer [`EventContext::next_metadata`] when those are
    /// known.
    pub fn stamp() -> Self {
        EventMetadata {
            id: Uuid::new_v4(),
            occurred_on_utc: SystemTime::now(),
            tenant_id: None,
            correlation_id: None,
        }
    }
}

/// Access to an event's embedded [`EventMetadata`].
pub trait HasEventMetadata {
    fn event_metadata(&self) -> &EventMetadata;
}

impl<E> IntegrationEvent for E
where
    E: HasEventMetadata + Any + Send + Sync,
{
    fn id(&self) -> Uuid {
        self.event_metadata().id
    }

    fn occurred_on_utc(&self) -> SystemTime {
        self.event_metadata().occurred_on_utc
    }

    fn tenant_id(&self) -> Option<&str> {
        self.event_metadata().tenant_id.as_deref()
    }

    fn correlation_id(&self) -> Option<&str> {
        self.event_metadata().correlation_id.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Explicit creation context for events.
///
/// Owned by the composition root and handed to whatever constructs events;
/// there is no process-wide static. Each request/operation typically builds
/// one context and stamps every event it produces through it, so tenant and
/// correlation propagate without the business code threading them by hand.
#[derive(Clone, Debug, Default)]
pub struct EventContext {
    tenant_id: Option<String>,
    correlation_id: Option<String>,
}

impl EventContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Stamp metadata for a new event: fresh id, current time, and this
    /// context's tenant and correlation.
    pub fn next_metadata(&self) -> EventMetadata {
        EventMetadata {
            id: Uuid::new_v4(),
            occurred_on_utc: SystemTime::now(),
            tenant_id: self.tenant_id.clone(),
            correlation_id: self.correlation_id.clone(),
        }
    }
}
