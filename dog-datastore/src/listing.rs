//! Paginated key enumeration.
//!
//! [`PageFetcher`] issues single listing calls and exposes the pages of a prefix as a
//! stream that follows continuation tokens. [`KeyEnumerator`] drains that stream into
//! the full key set and turns a key set into lazily fetched entries.
//!
//! A listing is a best-effort snapshot: objects written or removed while the pages
//! are being walked may or may not show up.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use futures_core::Stream;
use tracing::debug;

use crate::{
    BackendError, BlobDatastore, Datastore, DatastoreError, DatastoreResult, Entry, EntryStream,
    Key, ListingPage, ObjectBackend,
};

/// Stream of listing pages
pub type PageStream = Pin<Box<dyn Stream<Item = DatastoreResult<ListingPage>> + Send>>;

/// Single-page listing calls against one container
#[derive(Clone)]
pub struct PageFetcher {
    backend: Arc<dyn ObjectBackend>,
    container: String,
}

impl PageFetcher {
    pub fn new(backend: Arc<dyn ObjectBackend>, container: impl Into<String>) -> Self {
        Self {
            backend,
            container: container.into(),
        }
    }

    /// Fetch the page of `prefix` that starts at `token`
    pub async fn fetch(&self, prefix: &str, token: Option<&str>) -> DatastoreResult<ListingPage> {
        self.backend
            .list_objects(&self.container, prefix, token)
            .await
            .map_err(|source| listing_failed(prefix, source))
    }

    /// Pages of `prefix` in service order, ending after the page without a token.
    ///
    /// The first error ends the stream. Empty pages that still carry a token are
    /// followed like any other page.
    pub fn pages(&self, prefix: impl Into<String>) -> PageStream {
        let fetcher = self.clone();
        let prefix = prefix.into();

        Box::pin(async_stream::stream! {
            let mut token: Option<String> = None;
            loop {
                let page = match fetcher.fetch(&prefix, token.as_deref()).await {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                };

                let next = page.next_token.clone();
                if next.is_some() && next == token {
                    yield Err(listing_failed(
                        &prefix,
                        BackendError::service(
                            "StalledContinuationToken",
                            "listing returned the token it was given",
                        ),
                    ));
                    return;
                }

                yield Ok(page);

                match next {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }
        })
    }
}

fn listing_failed(prefix: &str, source: BackendError) -> DatastoreError {
    DatastoreError::ListingFailed {
        prefix: prefix.to_string(),
        code: source.code().to_string(),
        source,
    }
}

/// Full key listings and lazy value sequences for a [`BlobDatastore`]
pub struct KeyEnumerator {
    store: BlobDatastore,
    fetcher: PageFetcher,
}

impl KeyEnumerator {
    pub fn new(store: BlobDatastore) -> Self {
        let fetcher = PageFetcher::new(store.backend().clone(), store.container());
        Self { store, fetcher }
    }

    /// Every logical key whose backing identifier starts with `prefix`.
    ///
    /// Keys keep the order the service returned them in. An identifier repeated
    /// across pages is kept once, and identifiers outside the store root are skipped.
    pub async fn list_all(&self, prefix: &str) -> DatastoreResult<Vec<Key>> {
        let codec = self.store.codec();
        let mut pages = self.fetcher.pages(prefix);
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut page_count = 0usize;

        while let Some(page) = pages.next().await {
            let page = page?;
            page_count += 1;
            for id in page.entries {
                if !codec.contains(&id) {
                    continue;
                }
                let key = codec.to_logical_key(&id);
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }

        debug!("Listed {} keys under {:?} in {} pages", keys.len(), prefix, page_count);
        Ok(keys)
    }

    /// Entries for `keys`, one `get` per entry as the stream is polled.
    ///
    /// Keys-only entries carry no value and cause no reads. The first failed read,
    /// including `NotFound` for a key removed since it was listed, is yielded and
    /// ends the stream.
    pub fn values(&self, keys: Vec<Key>, keys_only: bool) -> EntryStream {
        let store = self.store.clone();

        Box::pin(async_stream::stream! {
            for key in keys {
                if keys_only {
                    yield Ok(Entry::key_only(key));
                    continue;
                }
                match store.get(&key).await {
                    Ok(value) => {
                        yield Ok(Entry::new(key, value));
                    }
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
        })
    }
}
