//! Common test utilities for engine integration tests.
//!
//! Provides an in-memory namespace service with call counters, injectable
//! failures, and pause points inside listing and bucket fetches, plus invariant checks
//! for committed edge sets.

#![allow(dead_code)]

use async_trait::async_trait;
use foldgraph_core::{
    bucket_id, BucketIndex, DirectoryListing, Edge, EdgeRecord, ExtractedEdges, FetchOutcome,
    GraphEngine, GraphStore, NamespaceService,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

// ============================================================================
// Mock Namespace
// ============================================================================

/// Pause point: the service signals `entered` and waits for `release`.
#[derive(Default)]
pub struct Pause {
    pub entered: Notify,
    pub release: Notify,
}

/// In-memory namespace service
#[derive(Default)]
pub struct MockNamespace {
    listings: HashMap<String, DirectoryListing>,
    live: ExtractedEdges,
    records: HashMap<String, EdgeRecord>,
    failing_listings: HashSet<String>,
    pub fail_extraction: AtomicBool,
    pub fail_buckets: AtomicBool,
    listing_calls: Mutex<HashMap<String, usize>>,
    pub extract_calls: AtomicUsize,
    pub bucket_calls: AtomicUsize,
    pause_buckets: AtomicBool,
    pub pause: Pause,
    paused_listing: Mutex<Option<String>>,
    pub listing_pause: Pause,
}

impl MockNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory's entries (local names)
    pub fn dir(mut self, id: &str, dirs: &[&str], files: &[&str]) -> Self {
        self.listings.insert(
            id.to_string(),
            DirectoryListing::new(
                dirs.iter().map(|s| s.to_string()).collect(),
                files.iter().map(|s| s.to_string()).collect(),
            ),
        );
        self
    }

    /// Register a live-extracted reference
    pub fn live(mut self, source: &str, target: &str) -> Self {
        self.live
            .entry(source.to_string())
            .or_default()
            .push(target.to_string());
        self
    }

    /// Register a pre-computed edge in both endpoint records
    pub fn bucket_edge(mut self, source: &str, target: &str) -> Self {
        self.records
            .entry(source.to_string())
            .or_default()
            .edges_from
            .push(target.to_string());
        self.records
            .entry(target.to_string())
            .or_default()
            .edges_to
            .push(source.to_string());
        self
    }

    pub fn failing_listing(mut self, id: &str) -> Self {
        self.failing_listings.insert(id.to_string());
        self
    }

    /// Make the next bucket fetch block on the pause point
    pub fn arm_pause(&self) {
        self.pause_buckets.store(true, Ordering::SeqCst);
    }

    /// Make the next listing of `id` block on the listing pause point
    pub fn arm_listing_pause(&self, id: &str) {
        *self.paused_listing.lock() = Some(id.to_string());
    }

    pub fn listing_calls(&self, id: &str) -> usize {
        self.listing_calls.lock().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl NamespaceService for MockNamespace {
    async fn list_directory(&self, path_id: &str) -> FetchOutcome<DirectoryListing> {
        *self
            .listing_calls
            .lock()
            .entry(path_id.to_string())
            .or_default() += 1;
        let paused = {
            let mut armed = self.paused_listing.lock();
            if armed.as_deref() == Some(path_id) {
                armed.take().is_some()
            } else {
                false
            }
        };
        if paused {
            self.listing_pause.entered.notify_one();
            self.listing_pause.release.notified().await;
        }
        if self.failing_listings.contains(path_id) {
            return FetchOutcome::failed("listing unavailable");
        }
        match self.listings.get(path_id) {
            Some(listing) => FetchOutcome::Ready(listing.clone()),
            None => FetchOutcome::Empty,
        }
    }

    async fn extract_edges(&self, files: &[String]) -> FetchOutcome<ExtractedEdges> {
        if files.is_empty() {
            return FetchOutcome::Empty;
        }
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_extraction.load(Ordering::SeqCst) {
            return FetchOutcome::failed("extractor offline");
        }
        let edges: ExtractedEdges = files
            .iter()
            .filter_map(|f| self.live.get(f).map(|t| (f.clone(), t.clone())))
            .collect();
        if edges.is_empty() {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Ready(edges)
        }
    }

    async fn fetch_buckets(&self, bucket_ids: &BTreeSet<String>) -> FetchOutcome<BucketIndex> {
        self.bucket_calls.fetch_add(1, Ordering::SeqCst);
        if self.pause_buckets.swap(false, Ordering::SeqCst) {
            self.pause.entered.notify_one();
            self.pause.release.notified().await;
        }
        if self.fail_buckets.load(Ordering::SeqCst) {
            return FetchOutcome::failed("bucket store offline");
        }
        let index: BucketIndex = self
            .records
            .iter()
            .filter(|(id, _)| bucket_ids.contains(&bucket_id(id)))
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect();
        FetchOutcome::Ready(index)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Build an engine over a fresh store
pub fn engine_with(service: Arc<MockNamespace>) -> GraphEngine {
    GraphEngine::new(Arc::new(RwLock::new(GraphStore::new())), service)
}

/// Current aggregated edges as sorted `(source, target)` pairs
pub fn edge_pairs(engine: &GraphEngine) -> Vec<(String, String)> {
    let store = engine.store();
    let store = store.read();
    let mut pairs: Vec<(String, String)> = store
        .links()
        .map(|e| (e.source, e.target))
        .collect();
    pairs.sort();
    pairs
}

pub fn pair(source: &str, target: &str) -> (String, String) {
    (source.to_string(), target.to_string())
}

/// Sorted visible IDs
pub fn visible_ids(engine: &GraphEngine) -> Vec<String> {
    let mut ids: Vec<String> = engine.store().read().visible_ids().into_iter().collect();
    ids.sort();
    ids
}

// ============================================================================
// Invariants
// ============================================================================

/// Check the committed edge set against the store's visibility.
///
/// Returns a list of violations; empty means the commit is consistent.
pub fn validate_commit(store: &GraphStore) -> Vec<String> {
    let visible = store.visible_ids();
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for edge in store.links() {
        if edge.source == edge.target {
            errors.push(format!("self-loop: {}", edge.id));
        }
        if !visible.contains(&edge.source) {
            errors.push(format!("hidden source: {}", edge.id));
        }
        if !visible.contains(&edge.target) {
            errors.push(format!("hidden target: {}", edge.id));
        }
        if edge.id != Edge::new(edge.source.clone(), edge.target.clone()).id {
            errors.push(format!("id not derived from endpoints: {}", edge.id));
        }
        if !seen.insert((edge.source.clone(), edge.target.clone())) {
            errors.push(format!("duplicate: {}", edge.id));
        }
    }
    errors
}

pub fn assert_consistent(engine: &GraphEngine) {
    let store = engine.store();
    let errors = validate_commit(&store.read());
    assert!(errors.is_empty(), "inconsistent commit: {:?}", errors);
}
