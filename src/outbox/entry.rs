use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::IntegrationEvent;
use crate::serializer::SerializedEvent;

/// Durable record of a not-yet-dispatched integration event.
///
/// Created on the business-write path, mutated only by the dispatcher through
/// the store's `mark_*` operations. `processed_on_utc` is set exactly once and
/// never cleared; `retry_count` only grows; `is_dead` only flips from false to
/// true.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Equals the event's id; primary key.
    pub id: Uuid,
    pub created_on_utc: SystemTime,
    /// Fully-qualified type tag used to reconstruct the event.
    pub event_type: String,
    /// Serialized event body.
    pub payload: String,
    pub tenant_id: Option<String>,
    pub correlation_id: Option<String>,
    pub processed_on_utc: Option<SystemTime>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub is_dead: bool,
}

impl OutboxEntry {
    /// Build a fresh pending entry for an event.
    pub fn new(event: &dyn IntegrationEvent, serialized: SerializedEvent) -> Self {
        OutboxEntry {
            id: event.id(),
            created_on_utc: SystemTime::now(),
            event_type: serialized.type_tag,
            payload: serialized.payload,
            tenant_id: event.tenant_id().map(str::to_string),
            correlation_id: event.correlation_id().map(str::to_string),
            processed_on_utc: None,
            retry_count: 0,
            last_error: None,
            is_dead: false,
        }
    }

    /// Whether the entry is still eligible for dispatch.
    pub fn is_pending(&self) -> bool {
        self.processed_on_utc.is_none() && !self.is_dead
    }
}
