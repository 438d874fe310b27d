use std::error::Error;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the idempotency ledger.
///
/// Keyed by `(event_id, handler_name)`; existence means the handler already
/// ran to completion for the event and must not run again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    pub event_id: Uuid,
    pub handler_name: String,
    pub event_type: String,
    pub tenant_id: Option<String>,
    pub processed_on_utc: SystemTime,
}

/// Error type for inbox operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxError {
    LockPoisoned(&'static str),
    /// A second insert for the same `(event_id, handler_name)` pair.
    ///
    /// Under the sequential dispatch model this cannot happen in normal
    /// operation; it signals a sequencing defect in the caller and is
    /// surfaced loudly rather than swallowed.
    DuplicateEntry {
        event_id: Uuid,
        handler_name: String,
    },
}

impl fmt::Display for InboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InboxError::LockPoisoned(operation) => {
                write!(f, "inbox lock poisoned during {}", operation)
            }
            InboxError::DuplicateEntry {
                event_id,
                handler_name,
            } => write!(
                f,
                "duplicate inbox entry for event {} and handler {}",
                event_id, handler_name
            ),
        }
    }
}

impl Error for InboxError {}

/// Durable idempotency ledger consulted by the event bus.
///
/// Implementations must enforce composite uniqueness on
/// `(event_id, handler_name)` at the storage layer; that constraint is the
/// only safety net against double-processing if dispatch is ever run
/// concurrently.
pub trait InboxStore: Send + Sync {
    /// Whether the handler already ran to completion for this event.
    fn has_processed(&self, event_id: Uuid, handler_name: &str) -> Result<bool, InboxError>;

    /// Record a completed handler run. Fails with
    /// [`InboxError::DuplicateEntry`] if a row already exists for the pair.
    fn mark_processed(&self, entry: InboxEntry) -> Result<(), InboxError>;
}
