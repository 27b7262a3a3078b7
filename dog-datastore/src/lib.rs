//! # dog-datastore: key-value datastore over object storage
//!
//! `dog-datastore` exposes a container of an object-storage service (flat namespace,
//! prefix listing, no real directories) as a key-value datastore with the usual
//! repo operations: put, get, has, delete, query, batch, open and close. An
//! advisory lock object keeps a second process from using the same datastore.
//!
//! ## Quick Start
//!
//! ```rust
//! use dog_datastore::prelude::*;
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> DatastoreResult<()> {
//! let store = BlobDatastore::new(MemoryBackend::new(), DatastoreConfig::new("ipfs"));
//! store.open().await?;
//!
//! store.put(&Key::new("/blocks/abc"), Bytes::from_static(b"hello")).await?;
//! assert_eq!(store.get(&Key::new("/blocks/abc")).await?, Bytes::from_static(b"hello"));
//!
//! let lock = BlobLock::new(store.clone());
//! let handle = lock.lock("/").await?;
//! handle.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  Datastore / Batch   │  ← logical keys, queries, batches
//! ├──────────────────────┤
//! │ KeyCodec/Enumerator  │  ← root-path mapping, paginated listing
//! ├──────────────────────┤
//! │    ObjectBackend     │  ← S3-compatible or in-memory objects
//! └──────────────────────┘
//! ```
//!
//! Logical keys such as `/z/key` are stored under a root path inside the container,
//! so with the default root `.ipfs/datastore` the object is `.ipfs/datastore/z/key`.
//! Queries list every matching key page by page, then fetch values one at a time
//! as the result stream is consumed.

pub mod backend;
mod batch;
mod codec;
mod config;
mod error;
mod key;
pub mod listing;
pub mod lock;
pub mod query;
pub mod store;

pub use backend::memory::MemoryBackend;
pub use backend::s3::{S3Backend, S3Config};
pub use backend::{ByteStream, ListingPage, ObjectBackend};
pub use batch::Batch;
pub use codec::KeyCodec;
pub use config::DatastoreConfig;
pub use error::{BackendError, BackendResult, DatastoreError, DatastoreResult};
pub use key::{Entry, Key};
pub use listing::{KeyEnumerator, PageFetcher, PageStream};
pub use lock::{shutdown_signal, BlobLock, LockHandle, NoopLock, RepoLock};
pub use query::{EntryStream, Filter, Order, Query};
pub use store::{BlobDatastore, Datastore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobDatastore, BlobLock, Datastore, DatastoreConfig, DatastoreError, DatastoreResult,
        Entry, Key, MemoryBackend, Query, RepoLock,
    };
}
