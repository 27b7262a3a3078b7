use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{ByteStream, ListingPage, ObjectBackend};
use crate::{BackendError, BackendResult};

const DEFAULT_PAGE_SIZE: usize = 1000;
const READ_CHUNK_SIZE: usize = 64 * 1024;

type Containers = HashMap<String, BTreeMap<String, Bytes>>;

/// In-memory object storage for testing and development.
///
/// Listing is paginated like a remote service: pages hold at most `page_size`
/// identifiers and the continuation token is the last identifier of the page.
#[derive(Clone)]
pub struct MemoryBackend {
    containers: Arc<RwLock<Containers>>,
    page_size: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            containers: Arc::new(RwLock::new(HashMap::new())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit the number of identifiers per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of objects currently held in a container
    pub fn object_count(&self, container: &str) -> usize {
        self.containers
            .read()
            .get(container)
            .map_or(0, BTreeMap::len)
    }

    /// Raw object content by backing identifier
    pub fn object(&self, container: &str, id: &str) -> Option<Bytes> {
        self.containers
            .read()
            .get(container)
            .and_then(|objects| objects.get(id).cloned())
    }

    fn missing_container(container: &str) -> BackendError {
        BackendError::service(
            "ContainerNotFound",
            format!("container {container} does not exist"),
        )
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn create_container_if_missing(&self, container: &str) -> BackendResult<()> {
        self.containers
            .write()
            .entry(container.to_string())
            .or_default();
        Ok(())
    }

    async fn write_object(&self, container: &str, id: &str, data: Bytes) -> BackendResult<()> {
        let mut containers = self.containers.write();
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| Self::missing_container(container))?;
        objects.insert(id.to_string(), data);
        Ok(())
    }

    async fn read_object(&self, container: &str, id: &str) -> BackendResult<ByteStream> {
        let data = {
            let containers = self.containers.read();
            let objects = containers
                .get(container)
                .ok_or_else(|| Self::missing_container(container))?;
            objects
                .get(id)
                .cloned()
                .ok_or_else(|| BackendError::not_found(id))?
        };

        // Serve the object in chunks so readers have to reassemble it
        let mut chunks: Vec<Result<Bytes, std::io::Error>> = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + READ_CHUNK_SIZE).min(data.len());
            chunks.push(Ok(data.slice(offset..end)));
            offset = end;
        }
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn object_exists(&self, container: &str, id: &str) -> BackendResult<bool> {
        let containers = self.containers.read();
        let objects = containers
            .get(container)
            .ok_or_else(|| Self::missing_container(container))?;
        Ok(objects.contains_key(id))
    }

    async fn delete_object(&self, container: &str, id: &str) -> BackendResult<()> {
        let mut containers = self.containers.write();
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| Self::missing_container(container))?;
        objects.remove(id);
        Ok(())
    }

    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        token: Option<&str>,
    ) -> BackendResult<ListingPage> {
        let containers = self.containers.read();
        let objects = containers
            .get(container)
            .ok_or_else(|| Self::missing_container(container))?;

        let lower = match token {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        let mut matching = objects
            .range((lower, Bound::Unbounded))
            .map(|(id, _)| id)
            .take_while(|id| id.starts_with(prefix));

        let entries: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let more = matching.next().is_some();
        let next_token = if more { entries.last().cloned() } else { None };

        Ok(ListingPage::new(entries, next_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn backend_with(ids: &[&str], page_size: usize) -> MemoryBackend {
        let backend = MemoryBackend::new().with_page_size(page_size);
        backend.create_container_if_missing("c").await.unwrap();
        for id in ids {
            backend
                .write_object("c", id, Bytes::from_static(b"x"))
                .await
                .unwrap();
        }
        backend
    }

    #[tokio::test]
    async fn test_list_pages_follow_tokens() {
        let backend = backend_with(&["p/a", "p/b", "p/c", "q/a"], 2).await;

        let first = backend.list_objects("c", "p/", None).await.unwrap();
        assert_eq!(first.entries, vec!["p/a", "p/b"]);
        assert_eq!(first.next_token.as_deref(), Some("p/b"));

        let second = backend
            .list_objects("c", "p/", first.next_token.as_deref())
            .await
            .unwrap();
        assert_eq!(second.entries, vec!["p/c"]);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn test_exact_page_boundary_has_no_token() {
        let backend = backend_with(&["p/a", "p/b"], 2).await;
        let page = backend.list_objects("c", "p", None).await.unwrap();
        assert_eq!(page.entries.len(), 2);
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn test_read_reassembles_chunks() {
        let backend = backend_with(&[], 10).await;
        let data = Bytes::from(vec![7u8; READ_CHUNK_SIZE * 2 + 5]);
        backend.write_object("c", "big", data.clone()).await.unwrap();

        let stream = backend.read_object("c", "big").await.unwrap();
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 3);
        let total: usize = chunks.iter().map(|c| c.as_ref().unwrap().len()).sum();
        assert_eq!(total, data.len());
    }

    #[tokio::test]
    async fn test_missing_object_and_container() {
        let backend = backend_with(&[], 10).await;
        let err = backend.read_object("c", "nope").await.err().unwrap();
        assert!(err.is_not_found());

        let err = backend.object_exists("other", "x").await.unwrap_err();
        assert_eq!(err.code(), "ContainerNotFound");

        backend.delete_object("c", "nope").await.unwrap();
    }
}
