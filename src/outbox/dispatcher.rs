use std::ops::AddAssign;
use std::sync::Arc;

use crate::bus::EventBus;
use crate::cancel::CancelToken;
use crate::options::DeliveryOptions;
use crate::serializer::EventSerializer;

use super::store::{OutboxError, OutboxStore};

/// Counts reported by one dispatch cycle. Observability only; correctness
/// lives in the store's entry states.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResult {
    /// Entries taken from the pending batch and looked at.
    pub considered: usize,
    /// Entries marked processed.
    pub processed: usize,
    /// Entries whose dispatch attempt failed (retry counter incremented).
    pub failed: usize,
    /// Entries that became dead this cycle, whether immediately (permanent
    /// error) or by reaching the retry ceiling.
    pub dead: usize,
}

impl AddAssign for DispatchResult {
    fn add_assign(&mut self, other: DispatchResult) {
        self.considered += other.considered;
        self.processed += other.processed;
        self.failed += other.failed;
        self.dead += other.dead;
    }
}

/// Runs one bounded dispatch cycle on demand.
///
/// The dispatcher does not self-schedule; an external scheduler invokes
/// [`dispatch`](OutboxDispatcher::dispatch) on its own interval and may treat
/// the call as fire-and-forget. Entries are processed sequentially in fetched
/// order, each in its own failure boundary, so one bad entry never aborts the
/// batch.
pub struct OutboxDispatcher<S> {
    store: S,
    bus: Arc<EventBus>,
    serializer: Arc<EventSerializer>,
    options: DeliveryOptions,
}

impl<S> OutboxDispatcher<S> {
    pub fn new(store: S, bus: Arc<EventBus>, serializer: Arc<EventSerializer>) -> Self {
        OutboxDispatcher {
            store,
            bus,
            serializer,
            options: DeliveryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DeliveryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DeliveryOptions {
        &self.options
    }
}

impl<S: OutboxStore> OutboxDispatcher<S> {
    /// Run one dispatch cycle without a cancellation signal.
    pub fn dispatch(&self) -> Result<DispatchResult, OutboxError> {
        self.dispatch_with(&CancelToken::new())
    }

    /// Run one dispatch cycle.
    ///
    /// Fetches up to the configured batch of pending entries (oldest first)
    /// and, for each: deserializes the payload, publishes via the bus, and
    /// records the outcome. An undeserializable payload is dead-lettered
    /// immediately; a bus failure increments the retry counter and
    /// dead-letters once the ceiling is reached. Cancellation is honored
    /// between entries only.
    ///
    /// Store failures while marking an entry propagate out; the entry stays
    /// pending and is re-selected on the next cycle.
    pub fn dispatch_with(&self, cancel: &CancelToken) -> Result<DispatchResult, OutboxError> {
        let max_retries = self.options.effective_max_retries();
        let batch = self
            .store
            .pending_batch(self.options.effective_batch_size())?;

        let mut result = DispatchResult::default();
        for entry in batch {
            if cancel.is_cancelled() {
                break;
            }
            result.considered += 1;

            let Some(event) = self.serializer.deserialize(&entry.event_type, &entry.payload)
            else {
                // Permanent error class; retrying has no value.
                self.store.mark_dead(entry.id, "cannot deserialize")?;
                result.dead += 1;
                continue;
            };

            match self.bus.publish(event.as_ref()) {
                Ok(()) => {
                    self.store.mark_processed(entry.id)?;
                    result.processed += 1;
                }
                Err(err) => {
                    let is_dead = entry.retry_count + 1 >= max_retries;
                    self.store.mark_failed(entry.id, &err.to_string(), is_dead)?;
                    result.failed += 1;
                    if is_dead {
                        result.dead += 1;
                    }
                }
            }
        }

        Ok(result)
    }
}
