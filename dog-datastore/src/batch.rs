use bytes::Bytes;
use tracing::debug;

use crate::{Datastore, DatastoreError, DatastoreResult, Key};

/// Writes collected locally and applied to a store on [`Batch::commit`].
///
/// Commit is sequential and best-effort: puts run first in insertion order, then
/// deletes in insertion order. The first failure stops the commit and operations
/// already applied stay applied.
pub struct Batch<D> {
    store: D,
    puts: Vec<(Key, Bytes)>,
    deletes: Vec<Key>,
}

impl<D: Datastore> Batch<D> {
    pub fn new(store: D) -> Self {
        Self {
            store,
            puts: Vec::new(),
            deletes: Vec::new(),
        }
    }

    /// Queue a put; repeated keys are all applied, in order
    pub fn put(&mut self, key: Key, value: Bytes) {
        self.puts.push((key, value));
    }

    pub fn delete(&mut self, key: Key) {
        self.deletes.push(key);
    }

    /// Number of pending operations
    pub fn len(&self) -> usize {
        self.puts.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn commit(self) -> DatastoreResult<()> {
        let Batch {
            store,
            puts,
            deletes,
        } = self;
        debug!("Committing batch: {} puts, {} deletes", puts.len(), deletes.len());

        for (key, value) in puts {
            store
                .put(&key, value)
                .await
                .map_err(DatastoreError::batch_failed)?;
        }
        for key in deletes {
            store
                .delete(&key)
                .await
                .map_err(DatastoreError::batch_failed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlobDatastore, DatastoreConfig, MemoryBackend};

    async fn store() -> BlobDatastore {
        let store = BlobDatastore::new(MemoryBackend::new(), DatastoreConfig::new("batch"));
        store.open().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_nothing_is_written_before_commit() {
        let store = store().await;
        let mut batch = Batch::new(store.clone());
        batch.put(Key::new("/a"), Bytes::from_static(b"1"));
        assert_eq!(batch.len(), 1);
        assert!(!store.has(&Key::new("/a")).await.unwrap());

        batch.commit().await.unwrap();
        assert!(store.has(&Key::new("/a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_puts_apply_before_deletes() {
        let store = store().await;
        let mut batch = store.batch();
        batch.delete(Key::new("/a"));
        batch.put(Key::new("/a"), Bytes::from_static(b"1"));
        batch.commit().await.unwrap();

        assert!(!store.has(&Key::new("/a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_repeated_puts_last_wins() {
        let store = store().await;
        let mut batch = store.batch();
        batch.put(Key::new("/a"), Bytes::from_static(b"1"));
        batch.put(Key::new("/a"), Bytes::from_static(b"2"));
        assert_eq!(batch.len(), 2);
        batch.commit().await.unwrap();

        assert_eq!(store.get(&Key::new("/a")).await.unwrap(), Bytes::from_static(b"2"));
    }

    #[tokio::test]
    async fn test_empty_commit() {
        let store = store().await;
        let batch = store.batch();
        assert!(batch.is_empty());
        batch.commit().await.unwrap();
    }
}
