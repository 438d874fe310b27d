use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::store::{InboxEntry, InboxError, InboxStore};

/// In-memory inbox for tests and single-process use.
///
/// Cloning creates another handle to the same ledger (thread-safe via
/// `Arc<RwLock<...>>`).
#[derive(Clone, Default)]
pub struct InMemoryInboxStore {
    entries: Arc<RwLock<HashMap<(Uuid, String), InboxEntry>>>,
}

impl InMemoryInboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in the ledger.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of a single row, if present.
    pub fn entry(&self, event_id: Uuid, handler_name: &str) -> Option<InboxEntry> {
        self.entries
            .read()
            .ok()?
            .get(&(event_id, handler_name.to_string()))
            .cloned()
    }
}

impl InboxStore for InMemoryInboxStore {
    fn has_processed(&self, event_id: Uuid, handler_name: &str) -> Result<bool, InboxError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| InboxError::LockPoisoned("read"))?;
        Ok(entries.contains_key(&(event_id, handler_name.to_string())))
    }

    fn mark_processed(&self, entry: InboxEntry) -> Result<(), InboxError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| InboxError::LockPoisoned("write"))?;
        let key = (entry.event_id, entry.handler_name.clone());
        if entries.contains_key(&key) {
            return Err(InboxError::DuplicateEntry {
                event_id: entry.event_id,
                handler_name: entry.handler_name,
            });
        }
        entries.insert(key, entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn entry(event_id: Uuid, handler_name: &str) -> InboxEntry {
        InboxEntry {
            event_id,
            handler_name: handler_name.to_string(),
            event_type: "TestEvent".to_string(),
            tenant_id: None,
            processed_on_utc: SystemTime::now(),
        }
    }

    #[test]
    fn mark_then_has_processed() {
        let inbox = InMemoryInboxStore::new();
        let event_id = Uuid::new_v4();

        assert!(!inbox.has_processed(event_id, "HandlerA").unwrap());
        inbox.mark_processed(entry(event_id, "HandlerA")).unwrap();
        assert!(inbox.has_processed(event_id, "HandlerA").unwrap());
    }

    #[test]
    fn handlers_are_tracked_independently() {
        let inbox = InMemoryInboxStore::new();
        let event_id = Uuid::new_v4();

        inbox.mark_processed(entry(event_id, "HandlerA")).unwrap();
        assert!(!inbox.has_processed(event_id, "HandlerB").unwrap());
    }

    #[test]
    fn duplicate_insert_fails_loudly() {
        let inbox = InMemoryInboxStore::new();
        let event_id = Uuid::new_v4();

        inbox.mark_processed(entry(event_id, "HandlerA")).unwrap();
        let err = inbox.mark_processed(entry(event_id, "HandlerA")).unwrap_err();
        assert_eq!(
            err,
            InboxError::DuplicateEntry {
                event_id,
                handler_name: "HandlerA".to_string(),
            }
        );
    }
}
