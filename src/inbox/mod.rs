//! Idempotent-consumer ledger.
//!
//! The inbox records "this subscriber already handled this event" so that
//! at-least-once delivery from the outbox never turns into observable
//! double-processing. Rows are written only after a subscriber succeeds and
//! are never mutated or deleted by this crate.

mod in_memory;
mod store;

pub use in_memory::InMemoryInboxStore;
pub use store::{InboxEntry, InboxError, InboxStore};
