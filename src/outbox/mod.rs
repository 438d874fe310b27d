//! Transactional-outbox side of the delivery pipeline.
//!
//! Business writes enqueue serialized events through [`Outbox::add`] in the
//! same transactional scope as their data; an externally scheduled
//! [`OutboxDispatcher`] later drains pending entries oldest-first and hands
//! them to the event bus, recording success, retry, or dead-letter back into
//! the store. Entries are never deleted here; retention is someone else's
//! concern.

mod dispatcher;
mod entry;
mod in_memory;
mod store;

pub use dispatcher::{DispatchResult, OutboxDispatcher};
pub use entry::OutboxEntry;
pub use in_memory::InMemoryOutboxStore;
pub use store::{Outbox, OutboxError, OutboxStore};
