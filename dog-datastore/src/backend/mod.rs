//! Object-storage capability consumed by the datastore.
//!
//! A backend addresses objects by container and full backing identifier. It knows
//! nothing about logical keys or root paths; that is the job of [`crate::KeyCodec`].

pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use std::pin::Pin;

use crate::BackendResult;

/// Stream of bytes for object content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// One page of a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Backing identifiers in the order the service returned them
    pub entries: Vec<String>,
    /// Opaque cursor for the next page, `None` on the last page
    pub next_token: Option<String>,
}

impl ListingPage {
    pub fn new(entries: Vec<String>, next_token: Option<String>) -> Self {
        Self {
            entries,
            next_token,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }
}

/// Primitive operations of a remote object-storage service.
///
/// Implementations must report a confirmed absence as [`crate::BackendError::NotFound`]
/// from `read_object`, and must treat deleting an absent object as success.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Create the container unless it already exists
    async fn create_container_if_missing(&self, container: &str) -> BackendResult<()>;

    /// Create or overwrite an object
    async fn write_object(&self, container: &str, id: &str, data: Bytes) -> BackendResult<()>;

    /// Open an object for reading
    async fn read_object(&self, container: &str, id: &str) -> BackendResult<ByteStream>;

    /// Whether an object exists
    async fn object_exists(&self, container: &str, id: &str) -> BackendResult<bool>;

    /// Remove an object, succeeding when it is already absent
    async fn delete_object(&self, container: &str, id: &str) -> BackendResult<()>;

    /// Fetch one page of identifiers starting with `prefix`
    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        token: Option<&str>,
    ) -> BackendResult<ListingPage>;
}
