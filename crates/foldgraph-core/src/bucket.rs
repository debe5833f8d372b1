//! Edge Buckets
//!
//! Pre-computed edge records are sharded into buckets keyed by the first
//! character of a node's local name. This module owns bucket addressing, the
//! record format, and an optional LRU cache in front of bucket fetches.
//!
//! # Architecture
//!
//! ```text
//! node id ──► local name ──► first char ──► percent-encode ──► "{bucket}.json"
//!                                                │
//!                              ┌─────────────────┴──────────────┐
//!                              │ CachedBuckets<S>               │
//!                              │   BucketCache (LRU, optional)  │
//!                              │   miss ──► S::fetch_buckets    │
//!                              └────────────────────────────────┘
//! ```

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use tracing::{debug, trace};

use crate::namespace;
use crate::source::{DirectoryListing, ExtractedEdges, FetchOutcome, NamespaceService};

/// Symbol used for IDs whose local name is empty
const EMPTY_SYMBOL: &str = "_";

// ============================================================================
// Addressing
// ============================================================================

/// The raw bucket symbol of a node ID: the first Unicode scalar of its local name.
pub fn bucket_symbol(id: &str) -> String {
    namespace::local_name(id)
        .chars()
        .next()
        .map(String::from)
        .unwrap_or_else(|| EMPTY_SYMBOL.to_string())
}

/// The bucket ID of a node ID (percent-encoded symbol).
///
/// # Examples
/// ```
/// use foldgraph_core::bucket::bucket_id;
///
/// assert_eq!(bucket_id("Notebook/notes.md"), "n");
/// assert_eq!(bucket_id("Notebook/été.md"), "%C3%A9");
/// ```
pub fn bucket_id(id: &str) -> String {
    urlencoding::encode(&bucket_symbol(id)).into_owned()
}

/// File name under which a bucket is stored.
pub fn bucket_file(bucket_id: &str) -> String {
    format!("{}.json", bucket_id)
}

/// Every bucket touched by a set of IDs.
pub fn buckets_for<'a, I>(ids: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    ids.into_iter().map(|id| bucket_id(id)).collect()
}

// ============================================================================
// Records
// ============================================================================

/// Pre-computed connectivity of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Targets this node links to
    #[serde(rename = "edgesFrom", alias = "edges_from", alias = "sources", default)]
    pub edges_from: Vec<String>,

    /// Sources that link to this node
    #[serde(
        rename = "edgesTo",
        alias = "edges_to",
        alias = "targets",
        alias = "destinations",
        default
    )]
    pub edges_to: Vec<String>,
}

impl EdgeRecord {
    pub fn new(edges_from: Vec<String>, edges_to: Vec<String>) -> Self {
        Self {
            edges_from,
            edges_to,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges_from.is_empty() && self.edges_to.is_empty()
    }

    /// Append entries not already present, keeping first-seen order
    pub fn absorb(&mut self, other: EdgeRecord) {
        extend_unique(&mut self.edges_from, other.edges_from);
        extend_unique(&mut self.edges_to, other.edges_to);
    }
}

/// Extend a list with new items, skipping ones already present.
pub fn extend_unique(list: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
}

/// Contents of a single bucket file: node ID → record.
pub type Bucket = HashMap<String, EdgeRecord>;

/// Records merged from any number of buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketIndex {
    records: HashMap<String, EdgeRecord>,
}

impl BucketIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one bucket's records into the index
    pub fn merge_bucket(&mut self, bucket: Bucket) {
        for (id, record) in bucket {
            self.insert(id, record);
        }
    }

    /// Insert a record, merging with an existing one for the same ID
    pub fn insert(&mut self, id: String, record: EdgeRecord) {
        self.records.entry(id).or_default().absorb(record);
    }

    pub fn record(&self, id: &str) -> Option<&EdgeRecord> {
        self.records.get(id)
    }

    /// Outgoing raw targets of a node
    pub fn outgoing(&self, id: &str) -> &[String] {
        self.records
            .get(id)
            .map(|r| r.edges_from.as_slice())
            .unwrap_or(&[])
    }

    /// Incoming raw sources of a node
    pub fn incoming(&self, id: &str) -> &[String] {
        self.records
            .get(id)
            .map(|r| r.edges_to.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Split records back into buckets by their IDs
    pub fn into_buckets(self) -> HashMap<String, Bucket> {
        let mut buckets: HashMap<String, Bucket> = HashMap::new();
        for (id, record) in self.records {
            buckets.entry(bucket_id(&id)).or_default().insert(id, record);
        }
        buckets
    }
}

impl FromIterator<(String, EdgeRecord)> for BucketIndex {
    fn from_iter<I: IntoIterator<Item = (String, EdgeRecord)>>(iter: I) -> Self {
        let mut index = BucketIndex::new();
        for (id, record) in iter {
            index.insert(id, record);
        }
        index
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    /// Buckets served from the cache
    pub hits: u64,
    /// Buckets that had to be fetched
    pub misses: u64,
    /// Buckets evicted to make room
    pub evictions: u64,
}

impl CacheMetrics {
    /// Get hit rate as a fraction (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState {
    buckets: Option<LruCache<String, Bucket>>,
    metrics: CacheMetrics,
}

/// LRU cache of fetched buckets keyed by bucket ID.
///
/// A capacity of zero disables caching: every lookup misses and inserts are
/// dropped. All methods take `&self`.
pub struct BucketCache {
    state: Mutex<CacheState>,
}

impl BucketCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                buckets: NonZeroUsize::new(capacity).map(LruCache::new),
                metrics: CacheMetrics::default(),
            }),
        }
    }

    /// Create a disabled cache
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().buckets.is_some()
    }

    /// Look up a bucket, recording a hit or miss
    pub fn get(&self, bucket_id: &str) -> Option<Bucket> {
        let mut state = self.state.lock();
        let found = state
            .buckets
            .as_mut()
            .and_then(|lru| lru.get(bucket_id).cloned());
        if found.is_some() {
            state.metrics.hits += 1;
        } else {
            state.metrics.misses += 1;
        }
        found
    }

    pub fn insert(&self, bucket_id: String, bucket: Bucket) {
        let mut state = self.state.lock();
        let evicted = match state.buckets.as_mut() {
            Some(lru) => lru
                .push(bucket_id.clone(), bucket)
                .is_some_and(|(old_key, _)| old_key != bucket_id),
            None => false,
        };
        if evicted {
            state.metrics.evictions += 1;
        }
    }

    /// Drop a bucket so the next fetch goes to the service
    pub fn invalidate(&self, bucket_id: &str) {
        if let Some(lru) = self.state.lock().buckets.as_mut() {
            lru.pop(bucket_id);
        }
    }

    pub fn clear(&self) {
        if let Some(lru) = self.state.lock().buckets.as_mut() {
            lru.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().buckets.as_ref().map_or(0, |lru| lru.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics.clone()
    }
}

impl std::fmt::Debug for BucketCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketCache")
            .field("len", &self.len())
            .field("metrics", &self.metrics())
            .finish()
    }
}

/// A [`NamespaceService`] whose bucket fetches go through a [`BucketCache`].
///
/// Listing and extraction pass straight through. Failed fetches are never
/// cached.
pub struct CachedBuckets<S> {
    inner: S,
    cache: BucketCache,
}

impl<S: NamespaceService> CachedBuckets<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            cache: BucketCache::new(capacity),
        }
    }

    pub fn cache(&self) -> &BucketCache {
        &self.cache
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: NamespaceService> NamespaceService for CachedBuckets<S> {
    async fn list_directory(&self, path_id: &str) -> FetchOutcome<DirectoryListing> {
        self.inner.list_directory(path_id).await
    }

    async fn extract_edges(&self, files: &[String]) -> FetchOutcome<ExtractedEdges> {
        self.inner.extract_edges(files).await
    }

    async fn fetch_buckets(&self, bucket_ids: &BTreeSet<String>) -> FetchOutcome<BucketIndex> {
        let mut merged = BucketIndex::new();
        let mut missing = BTreeSet::new();
        let mut served = 0usize;

        for id in bucket_ids {
            match self.cache.get(id) {
                Some(bucket) => {
                    merged.merge_bucket(bucket);
                    served += 1;
                }
                None => {
                    missing.insert(id.clone());
                }
            }
        }
        trace!(served, missing = missing.len(), "Bucket cache lookup");

        if missing.is_empty() {
            return FetchOutcome::Ready(merged);
        }

        let fetched = self.inner.fetch_buckets(&missing).await;
        let failed = match fetched {
            FetchOutcome::Ready(index) => {
                let mut split = index.into_buckets();
                for id in &missing {
                    let bucket = split.remove(id).unwrap_or_default();
                    merged.merge_bucket(bucket.clone());
                    self.cache.insert(id.clone(), bucket);
                }
                None
            }
            FetchOutcome::Empty => {
                for id in &missing {
                    self.cache.insert(id.clone(), Bucket::new());
                }
                None
            }
            FetchOutcome::Failed(reason) => {
                debug!("Bucket fetch failed, not caching: {}", reason);
                Some(reason)
            }
        };

        match failed {
            Some(reason) if served == 0 => FetchOutcome::Failed(reason),
            _ if merged.is_empty() => FetchOutcome::Empty,
            _ => FetchOutcome::Ready(merged),
        }
    }
}
