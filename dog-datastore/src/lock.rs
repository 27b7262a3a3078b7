//! Advisory repo locks.
//!
//! A [`BlobLock`] marks a scope as in use by writing an empty lock object into a
//! datastore. It is cooperative only: two processes racing between the existence
//! check and the write can both believe they hold the lock.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{info, warn};

use crate::{Datastore, DatastoreError, DatastoreResult, Key};

const DEFAULT_LOCK_FILE: &str = "repo.lock";

/// Lock interface used by repo-style callers
#[async_trait]
pub trait RepoLock: Send + Sync {
    /// Take the lock for `scope`, failing with `AlreadyLocked` when it is held
    async fn lock(&self, scope: &str) -> DatastoreResult<LockHandle>;

    /// Whether the lock for `scope` is currently held
    async fn locked(&self, scope: &str) -> DatastoreResult<bool>;
}

/// Lock stored as an object in a datastore
#[derive(Clone)]
pub struct BlobLock {
    store: Arc<dyn Datastore>,
    lock_file: String,
}

impl BlobLock {
    pub fn new<D: Datastore + 'static>(store: D) -> Self {
        Self::with_store(Arc::new(store))
    }

    pub fn with_store(store: Arc<dyn Datastore>) -> Self {
        Self {
            store,
            lock_file: DEFAULT_LOCK_FILE.to_string(),
        }
    }

    /// Use a different lock object name
    pub fn with_lock_file<S: Into<String>>(mut self, lock_file: S) -> Self {
        self.lock_file = lock_file.into();
        self
    }

    /// Key of the lock object for a scope
    pub fn lock_key(&self, scope: &str) -> Key {
        Key::new(scope).child(&self.lock_file)
    }
}

#[async_trait]
impl RepoLock for BlobLock {
    async fn lock(&self, scope: &str) -> DatastoreResult<LockHandle> {
        match self.locked(scope).await {
            Ok(false) => {}
            Ok(true) => {
                return Err(DatastoreError::AlreadyLocked {
                    scope: scope.to_string(),
                    source: None,
                });
            }
            Err(err) => {
                return Err(DatastoreError::AlreadyLocked {
                    scope: scope.to_string(),
                    source: Some(Box::new(err)),
                });
            }
        }

        let key = self.lock_key(scope);
        self.store.put(&key, Bytes::new()).await?;
        info!("Acquired repo lock {}", key);

        Ok(LockHandle::held(self.store.clone(), key))
    }

    async fn locked(&self, scope: &str) -> DatastoreResult<bool> {
        self.store.has(&self.lock_key(scope)).await
    }
}

/// Lock that is never held, for single-process setups and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLock;

#[async_trait]
impl RepoLock for NoopLock {
    async fn lock(&self, _scope: &str) -> DatastoreResult<LockHandle> {
        Ok(LockHandle::noop())
    }

    async fn locked(&self, _scope: &str) -> DatastoreResult<bool> {
        Ok(false)
    }
}

/// An acquired lock; [`LockHandle::close`] releases it.
///
/// Dropping a handle without closing it leaves the lock object behind.
pub struct LockHandle {
    held: Option<(Arc<dyn Datastore>, Key)>,
}

impl LockHandle {
    fn held(store: Arc<dyn Datastore>, key: Key) -> Self {
        Self {
            held: Some((store, key)),
        }
    }

    /// Handle that releases nothing
    pub fn noop() -> Self {
        Self { held: None }
    }

    /// Key of the lock object, `None` for no-op handles
    pub fn key(&self) -> Option<&Key> {
        self.held.as_ref().map(|(_, key)| key)
    }

    /// Remove the lock object. Releasing an already missing lock succeeds.
    pub async fn close(mut self) -> DatastoreResult<()> {
        if let Some((store, key)) = self.held.take() {
            store.delete(&key).await?;
            info!("Released repo lock {}", key);
        }
        Ok(())
    }

    /// Wait for `signal`, then release the lock.
    ///
    /// A failed release is logged and swallowed so the caller can still exit.
    pub async fn release_on<F>(self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;
        info!("Attempting to clean up repo lock");
        match self.close().await {
            Ok(()) => info!("Cleanup complete"),
            Err(err) => warn!("Repo lock cleanup failed: {}", err),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Some((_, key)) = &self.held {
            warn!("Lock handle for {} dropped without close, lock left behind", key);
        }
    }
}

/// Resolves on Ctrl-C, and on SIGTERM or SIGHUP on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(mut term), Ok(mut hangup)) => {
                tokio::select! {
                    _ = term.recv() => {},
                    _ = hangup.recv() => {},
                }
            }
            _ => {
                warn!("Failed to install termination signal handlers");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
