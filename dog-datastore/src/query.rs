use std::cmp::Ordering;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures::{future, StreamExt};
use futures_core::Stream;

use crate::{DatastoreResult, Entry};

/// Lazy stream of query results
pub type EntryStream = Pin<Box<dyn Stream<Item = DatastoreResult<Entry>> + Send>>;

/// Predicate an entry must satisfy to be kept
pub type Filter = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

/// Comparator used to order entries
pub type Order = Arc<dyn Fn(&Entry, &Entry) -> Ordering + Send + Sync>;

/// Declarative query over the datastore.
///
/// Stages run in a fixed order: filters (in declaration order), orders, offset, limit.
#[derive(Clone, Default)]
pub struct Query {
    /// Raw key prefix, matched as a string prefix of the backing identifier
    pub prefix: String,
    pub keys_only: bool,
    pub filters: Vec<Filter>,
    /// The first comparator is the primary one; later ones only break ties
    pub orders: Vec<Order>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Return keys without fetching values
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn order<F>(mut self, order: F) -> Self
    where
        F: Fn(&Entry, &Entry) -> Ordering + Send + Sync + 'static,
    {
        self.orders.push(Arc::new(order));
        self
    }

    pub fn order_by_key(self) -> Self {
        self.order(|a, b| a.key.cmp(&b.key))
    }

    pub fn order_by_key_desc(self) -> Self {
        self.order(|a, b| b.key.cmp(&a.key))
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn compare(&self, a: &Entry, b: &Entry) -> Ordering {
        self.orders
            .iter()
            .fold(Ordering::Equal, |acc, order| acc.then_with(|| order(a, b)))
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("prefix", &self.prefix)
            .field("keys_only", &self.keys_only)
            .field("filters", &self.filters.len())
            .field("orders", &self.orders.len())
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .finish()
    }
}

/// Compose the query stages over a stream of entries.
///
/// Everything stays lazy except ordering, which has to see every filtered entry
/// before it can emit the first one. Errors pass through every stage untouched and
/// are counted by neither offset nor limit.
pub fn run_pipeline(query: &Query, entries: EntryStream) -> EntryStream {
    let mut stream = entries;

    for filter in query.filters.iter().cloned() {
        stream = Box::pin(stream.filter(move |item| {
            let keep = match item {
                Ok(entry) => filter(entry),
                Err(_) => true,
            };
            future::ready(keep)
        }));
    }

    if !query.orders.is_empty() {
        let ordering = query.clone();
        let mut source = stream;
        stream = Box::pin(async_stream::stream! {
            let mut collected = Vec::new();
            while let Some(item) = source.next().await {
                match item {
                    Ok(entry) => collected.push(entry),
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
            // stable: equal entries keep their listing order
            collected.sort_by(|a, b| ordering.compare(a, b));
            for entry in collected {
                yield Ok(entry);
            }
        });
    }

    if let Some(offset) = query.offset {
        let mut skipped = 0usize;
        stream = Box::pin(stream.filter(move |item| {
            let keep = item.is_err() || skipped >= offset;
            if !keep {
                skipped += 1;
            }
            future::ready(keep)
        }));
    }

    if let Some(limit) = query.limit {
        let mut source = stream;
        stream = Box::pin(async_stream::stream! {
            let mut taken = 0usize;
            while taken < limit {
                match source.next().await {
                    Some(item) => {
                        if item.is_ok() {
                            taken += 1;
                        }
                        yield item;
                    }
                    None => return,
                }
            }
        });
    }

    stream
}
