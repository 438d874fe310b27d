//! In-process publish/subscribe with idempotent-subscriber semantics.
//!
//! Subscribers register against concrete event types in a registry built once
//! at startup; publishing resolves the registry, consults the inbox ledger to
//! skip subscribers that already handled the event, and records each success
//! back into the inbox.

mod event_bus;
mod subscriber;

pub use event_bus::{EventBus, PublishError};
pub use subscriber::{EventSubscriber, HandlerError};
