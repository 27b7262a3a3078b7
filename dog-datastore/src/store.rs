use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::query::run_pipeline;
use crate::{
    BackendError, Batch, BlobLock, ByteStream, DatastoreConfig, DatastoreError, DatastoreResult,
    EntryStream, Key, KeyCodec, KeyEnumerator, ObjectBackend, Query,
};

/// Key-value storage interface consumed by repo-style callers
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Check the store is reachable and initialized
    async fn open(&self) -> DatastoreResult<()>;

    /// Release local resources
    async fn close(&self) -> DatastoreResult<()>;

    /// Store a value, replacing any previous one
    async fn put(&self, key: &Key, value: Bytes) -> DatastoreResult<()>;

    /// Read a whole value; `NotFound` when the key is absent
    async fn get(&self, key: &Key) -> DatastoreResult<Bytes>;

    /// Whether a key exists; errors are never reported as `false`
    async fn has(&self, key: &Key) -> DatastoreResult<bool>;

    /// Remove a key; absent keys are not an error
    async fn delete(&self, key: &Key) -> DatastoreResult<()>;

    /// List, filter, order and page entries
    async fn query(&self, query: Query) -> DatastoreResult<EntryStream>;

    /// Start a batch of writes applied on commit
    fn batch(&self) -> Batch<Self>
    where
        Self: Sized + Clone,
    {
        Batch::new(self.clone())
    }
}

/// Datastore backed by a container of an object-storage service.
///
/// Logical keys live under the configured root path of the container. Cloning is
/// cheap and clones share the backend.
#[derive(Clone)]
pub struct BlobDatastore {
    backend: Arc<dyn ObjectBackend>,
    config: Arc<DatastoreConfig>,
    codec: KeyCodec,
}

impl BlobDatastore {
    pub fn new<B: ObjectBackend + 'static>(backend: B, config: DatastoreConfig) -> Self {
        Self::with_backend(Arc::new(backend), config)
    }

    /// Create over a shared backend
    pub fn with_backend(backend: Arc<dyn ObjectBackend>, config: DatastoreConfig) -> Self {
        let codec = KeyCodec::new(&config.root_path);
        Self {
            backend,
            config: Arc::new(config),
            codec,
        }
    }

    pub fn backend(&self) -> &Arc<dyn ObjectBackend> {
        &self.backend
    }

    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    pub fn container(&self) -> &str {
        &self.config.container
    }

    /// Advisory repo lock kept in this store, named by the configured lock file
    pub fn repo_lock(&self) -> BlobLock {
        BlobLock::new(self.clone()).with_lock_file(self.config.lock_file.clone())
    }

    /// Key enumerator over this store
    pub fn enumerator(&self) -> KeyEnumerator {
        KeyEnumerator::new(self.clone())
    }

    /// Every entry of the store, fetched lazily.
    ///
    /// This is a full scan of the root path and should be rare.
    pub async fn all(&self) -> DatastoreResult<EntryStream> {
        self.query(Query::new()).await
    }

    async fn collect_stream(key: &Key, mut stream: ByteStream) -> DatastoreResult<Bytes> {
        let mut data = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| DatastoreError::ReadFailed {
                key: key.to_string(),
                source: BackendError::from(source),
            })?;
            data.extend_from_slice(&chunk);
        }
        Ok(data.freeze())
    }
}

#[async_trait]
impl Datastore for BlobDatastore {
    #[instrument(skip(self), fields(container = %self.config.container))]
    async fn open(&self) -> DatastoreResult<()> {
        if self.config.create_container_if_missing {
            self.backend
                .create_container_if_missing(self.container())
                .await
                .map_err(|source| DatastoreError::OpenFailed { source })?;
        }

        let root = self.codec.full_key(&Key::root());
        let exists = match self.backend.object_exists(self.container(), &root).await {
            Ok(exists) => exists,
            Err(source) if source.is_not_found() => false,
            Err(source) => {
                debug!("Root probe failed: {}", source);
                return Err(DatastoreError::OpenFailed { source });
            }
        };

        if !exists {
            debug!("Creating root marker {}", root);
            self.backend
                .write_object(self.container(), &root, Bytes::new())
                .await
                .map_err(|source| DatastoreError::OpenFailed { source })?;
        }

        info!("Datastore opened at {}", root);
        Ok(())
    }

    async fn close(&self) -> DatastoreResult<()> {
        info!("Datastore closed: {}", self.config.container);
        Ok(())
    }

    async fn put(&self, key: &Key, value: Bytes) -> DatastoreResult<()> {
        let id = self.codec.full_key(key);
        self.backend
            .write_object(self.container(), &id, value)
            .await
            .map_err(|source| {
                debug!("Write of {} failed: {}", id, source);
                DatastoreError::WriteFailed {
                    key: key.to_string(),
                    source,
                }
            })
    }

    async fn get(&self, key: &Key) -> DatastoreResult<Bytes> {
        let id = self.codec.full_key(key);
        let stream = match self.backend.read_object(self.container(), &id).await {
            Ok(stream) => stream,
            Err(source) if source.is_not_found() => {
                return Err(DatastoreError::not_found(key.as_str()));
            }
            Err(source) => {
                debug!("Read of {} failed: {}", id, source);
                return Err(DatastoreError::ReadFailed {
                    key: key.to_string(),
                    source,
                });
            }
        };
        Self::collect_stream(key, stream).await
    }

    async fn has(&self, key: &Key) -> DatastoreResult<bool> {
        let id = self.codec.full_key(key);
        match self.backend.object_exists(self.container(), &id).await {
            Ok(exists) => Ok(exists),
            Err(source) if source.is_not_found() => Ok(false),
            Err(source) => {
                debug!("Existence check of {} failed: {}", id, source);
                Err(DatastoreError::ExistenceCheckFailed {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    async fn delete(&self, key: &Key) -> DatastoreResult<()> {
        let id = self.codec.full_key(key);
        match self.backend.delete_object(self.container(), &id).await {
            Ok(()) => Ok(()),
            Err(source) if source.is_not_found() => Ok(()),
            Err(source) => {
                debug!("Delete of {} failed: {}", id, source);
                Err(DatastoreError::DeleteFailed {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    #[instrument(skip(self, query), fields(prefix = %query.prefix, keys_only = query.keys_only))]
    async fn query(&self, query: Query) -> DatastoreResult<EntryStream> {
        let prefix = self.codec.list_prefix(&query.prefix);
        if Key::new(&query.prefix).is_root() && !query.keys_only {
            warn!("Query over the whole datastore, every value will be fetched");
        }

        let enumerator = self.enumerator();
        let keys = enumerator.list_all(&prefix).await?;
        debug!("Query matched {} keys", keys.len());

        let entries = enumerator.values(keys, query.keys_only);
        Ok(run_pipeline(&query, entries))
    }
}
