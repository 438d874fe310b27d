use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use uuid::Uuid;

use super::entry::OutboxEntry;
use super::store::{OutboxError, OutboxStore};

/// In-memory outbox for tests and single-process use.
///
/// Cloning creates another handle to the same storage (thread-safe via
/// `Arc<RwLock<...>>`), so business code and the dispatcher can share one
/// queue. Entries are kept in insertion order; the pending scan sorts by
/// creation time with insertion order breaking ties.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    entries: Arc<RwLock<Vec<OutboxEntry>>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one entry, if present.
    pub fn get(&self, id: Uuid) -> Option<OutboxEntry> {
        self.entries
            .read()
            .ok()?
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
    }

    /// Total entries held, including processed and dead ones.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutboxStore for InMemoryOutboxStore {
    fn add(&self, entry: OutboxEntry) -> Result<(), OutboxError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| OutboxError::LockPoisoned("add"))?;
        if entries.iter().any(|existing| existing.id == entry.id) {
            return Err(OutboxError::DuplicateEntry(entry.id));
        }
        entries.push(entry);
        Ok(())
    }

    fn pending_batch(&self, batch_size: usize) -> Result<Vec<OutboxEntry>, OutboxError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| OutboxError::LockPoisoned("pending_batch"))?;
        let mut pending: Vec<&OutboxEntry> =
            entries.iter().filter(|entry| entry.is_pending()).collect();
        // Stable sort keeps insertion order for equal timestamps.
        pending.sort_by_key(|entry| entry.created_on_utc);
        Ok(pending.into_iter().take(batch_size).cloned().collect())
    }

    fn mark_processed(&self, id: Uuid) -> Result<(), OutboxError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| OutboxError::LockPoisoned("mark_processed"))?;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(OutboxError::NotFound(id))?;
        if entry.processed_on_utc.is_none() {
            entry.processed_on_utc = Some(SystemTime::now());
        }
        Ok(())
    }

    fn mark_failed(&self, id: Uuid, error: &str, is_dead: bool) -> Result<(), OutboxError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| OutboxError::LockPoisoned("mark_failed"))?;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(OutboxError::NotFound(id))?;
        entry.retry_count = entry.retry_count.saturating_add(1);
        entry.last_error = Some(error.to_string());
        entry.is_dead = entry.is_dead || is_dead;
        Ok(())
    }

    fn mark_dead(&self, id: Uuid, error: &str) -> Result<(), OutboxError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| OutboxError::LockPoisoned("mark_dead"))?;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(OutboxError::NotFound(id))?;
        entry.is_dead = true;
        entry.last_error = Some(error.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry_created_at(created_on_utc: SystemTime) -> OutboxEntry {
        OutboxEntry {
            id: Uuid::new_v4(),
            created_on_utc,
            event_type: "TestEvent".to_string(),
            payload: "{}".to_string(),
            tenant_id: None,
            correlation_id: None,
            processed_on_utc: None,
            retry_count: 0,
            last_error: None,
            is_dead: false,
        }
    }

    fn entry() -> OutboxEntry {
        entry_created_at(SystemTime::now())
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let store = InMemoryOutboxStore::new();
        let first = entry();
        let second = OutboxEntry {
            payload: "{\"again\":true}".to_string(),
            ..first.clone()
        };

        store.add(first.clone()).unwrap();
        let err = store.add(second).unwrap_err();
        assert!(matches!(err, OutboxError::DuplicateEntry(id) if id == first.id));
    }

    #[test]
    fn pending_batch_is_oldest_first_and_bounded() {
        let store = InMemoryOutboxStore::new();
        let base = SystemTime::now();
        let t3 = entry_created_at(base + Duration::from_secs(3));
        let t1 = entry_created_at(base + Duration::from_secs(1));
        let t2 = entry_created_at(base + Duration::from_secs(2));
        store.add(t3.clone()).unwrap();
        store.add(t1.clone()).unwrap();
        store.add(t2.clone()).unwrap();

        let batch = store.pending_batch(2).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, t1.id);
        assert_eq!(batch[1].id, t2.id);
    }

    #[test]
    fn processed_and_dead_entries_are_not_selected() {
        let store = InMemoryOutboxStore::new();
        let processed = entry();
        let dead = entry();
        let pending = entry();
        store.add(processed.clone()).unwrap();
        store.add(dead.clone()).unwrap();
        store.add(pending.clone()).unwrap();

        store.mark_processed(processed.id).unwrap();
        store.mark_dead(dead.id, "cannot deserialize").unwrap();

        let batch = store.pending_batch(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, pending.id);
    }

    #[test]
    fn mark_processed_first_write_wins() {
        let store = InMemoryOutboxStore::new();
        let item = entry();
        store.add(item.clone()).unwrap();

        store.mark_processed(item.id).unwrap();
        let first = store.get(item.id).unwrap().processed_on_utc;

        store.mark_processed(item.id).unwrap();
        let second = store.get(item.id).unwrap().processed_on_utc;
        assert_eq!(first, second);
    }

    #[test]
    fn mark_failed_is_monotonic() {
        let store = InMemoryOutboxStore::new();
        let item = entry();
        store.add(item.clone()).unwrap();

        store.mark_failed(item.id, "first", false).unwrap();
        store.mark_failed(item.id, "second", true).unwrap();
        // A later non-dead failure never clears the flag.
        store.mark_failed(item.id, "third", false).unwrap();

        let stored = store.get(item.id).unwrap();
        assert_eq!(stored.retry_count, 3);
        assert_eq!(stored.last_error.as_deref(), Some("third"));
        assert!(stored.is_dead);
    }

    #[test]
    fn mark_dead_leaves_retry_count_alone() {
        let store = InMemoryOutboxStore::new();
        let item = entry();
        store.add(item.clone()).unwrap();

        store.mark_dead(item.id, "cannot deserialize").unwrap();

        let stored = store.get(item.id).unwrap();
        assert!(stored.is_dead);
        assert_eq!(stored.retry_count, 0);
        assert_eq!(stored.last_error.as_deref(), Some("cannot deserialize"));
    }

    #[test]
    fn marking_an_unknown_entry_fails() {
        let store = InMemoryOutboxStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.mark_processed(id).unwrap_err(),
            OutboxError::NotFound(missing) if missing == id
        ));
    }
}
