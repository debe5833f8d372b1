//! Graph Engine
//!
//! Orchestrates directory loading, visibility, and edge recomputation over a
//! caller-owned [`GraphStore`].
//!
//! # Architecture
//!
//! ```text
//! expand / collapse / load_root
//!        │
//!        ├─► list_directory (first expand only) ──► materialize hidden children
//!        ├─► flip visibility flags in the store
//!        └─► recompute()
//!               │ snapshot visible ids + visible files      (read lock)
//!               │ extract_edges ║ fetch_buckets             (no lock, concurrent)
//!               │ aggregate against *current* visible ids   (write lock)
//!               └─► replace_links                           (same write lock)
//! ```
//!
//! Store and loader locks are parking_lot locks and are never held across an
//! `.await`.

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::aggregator::aggregate;
use crate::bucket::{buckets_for, BucketIndex};
use crate::error::{EngineError, Result};
use crate::graph::{GraphStore, Node, NodeKind};
use crate::namespace;
use crate::recompute::{
    Admission, CommitSummary, Completion, PassGuard, RecomputeGate, RecomputeOutcome,
};
use crate::selection::SelectionState;
use crate::source::{DirectoryListing, ExtractedEdges, FetchOutcome, NamespaceService};
use crate::state::{DirectoryState, DirectoryStates};
use crate::status::{Status, StatusSink};

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Prefix stripped from selected IDs before publishing.
    ///
    /// Defaults to the first segment of the selected ID.
    pub root_prefix: Option<String>,
}

impl EngineOptions {
    pub fn with_root_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.root_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Default)]
struct LoaderState {
    directories: DirectoryStates,
    /// Directories with a listing request in flight
    loading: HashSet<String>,
}

/// Hierarchical visibility and edge aggregation engine.
///
/// All methods take `&self`; the engine can be shared behind an `Arc` and
/// driven from several tasks.
pub struct GraphEngine {
    store: Arc<RwLock<GraphStore>>,
    service: Arc<dyn NamespaceService>,
    options: EngineOptions,
    loader: Mutex<LoaderState>,
    gate: RecomputeGate,
    status: StatusSink,
    selection: SelectionState,
    listing_requests: AtomicUsize,
}

impl GraphEngine {
    /// Create an engine over a caller-owned store
    pub fn new(store: Arc<RwLock<GraphStore>>, service: Arc<dyn NamespaceService>) -> Self {
        Self::with_options(store, service, EngineOptions::default())
    }

    pub fn with_options(
        store: Arc<RwLock<GraphStore>>,
        service: Arc<dyn NamespaceService>,
        options: EngineOptions,
    ) -> Self {
        Self {
            store,
            service,
            options,
            loader: Mutex::new(LoaderState::default()),
            gate: RecomputeGate::new(),
            status: StatusSink::new(),
            selection: SelectionState::new(),
            listing_requests: AtomicUsize::new(0),
        }
    }

    /// The shared store
    pub fn store(&self) -> Arc<RwLock<GraphStore>> {
        Arc::clone(&self.store)
    }

    // ------------------------------------------------------------------------
    // Visibility mutators
    // ------------------------------------------------------------------------

    /// Materialize the namespace root as a visible directory and expand it.
    pub async fn load_root(&self, root_id: &str) -> Result<RecomputeOutcome> {
        info!("Loading namespace root {}", root_id);
        {
            let mut store = self.store.write();
            if store.add_node(Node::directory(root_id, None)) {
                debug!("Created root node {}", root_id);
            }
        }
        self.expand(root_id).await
    }

    /// Expand a directory, loading its children on first use.
    ///
    /// Children are revealed only when the directory itself is visible; an
    /// expanded directory under a collapsed ancestor stays hidden until that
    /// ancestor is expanded.
    ///
    /// The expanded flag is set before the listing is fetched, so a
    /// `collapse` issued while the listing is in flight is the one that
    /// sticks. The load itself still completes.
    pub async fn expand(&self, dir_id: &str) -> Result<RecomputeOutcome> {
        self.require_directory(dir_id)?;

        let needs_listing = {
            let mut loader = self.loader.lock();
            loader.directories.set_expanded(dir_id, true);
            !loader.directories.is_loaded(dir_id) && loader.loading.insert(dir_id.to_string())
        };

        if needs_listing {
            let listing = self.fetch_listing(dir_id).await;
            let added = self.materialize(dir_id, &listing);

            let mut loader = self.loader.lock();
            loader.loading.remove(dir_id);
            loader.directories.mark_loaded(dir_id);
            debug!("Loaded {} ({} new children)", dir_id, added);
        }

        {
            let loader = self.loader.lock();
            if loader.directories.is_expanded(dir_id) {
                let mut store = self.store.write();
                reveal(&mut store, &loader.directories, dir_id);
            } else {
                debug!("{} was collapsed while loading; children stay hidden", dir_id);
            }
        }

        Ok(self.recompute().await)
    }

    /// Collapse a directory and every expanded directory below it.
    ///
    /// Loaded children are kept; re-expanding is a visibility flip.
    pub async fn collapse(&self, dir_id: &str) -> Result<RecomputeOutcome> {
        self.require_directory(dir_id)?;

        {
            let mut loader = self.loader.lock();
            let mut store = self.store.write();
            loader.directories.set_expanded(dir_id, false);
            let descendants = store.descendants(dir_id);
            for id in &descendants {
                if loader.directories.get(id).is_some() {
                    loader.directories.set_expanded(id, false);
                }
                store.set_hidden(id, true);
            }
            debug!("Collapsed {} ({} descendants hidden)", dir_id, descendants.len());
        }

        Ok(self.recompute().await)
    }

    /// Expand a collapsed directory or collapse an expanded one
    pub async fn toggle(&self, dir_id: &str) -> Result<RecomputeOutcome> {
        if self.loader.lock().directories.is_expanded(dir_id) {
            self.collapse(dir_id).await
        } else {
            self.expand(dir_id).await
        }
    }

    fn require_directory(&self, id: &str) -> Result<()> {
        match self.store.read().get_node(id).map(|n| n.kind) {
            Some(NodeKind::Directory) => Ok(()),
            Some(NodeKind::File) => Err(EngineError::not_a_directory(id)),
            None => Err(EngineError::node_not_found(id)),
        }
    }

    async fn fetch_listing(&self, dir_id: &str) -> DirectoryListing {
        self.status.set(Status::Loading(dir_id.to_string()));
        self.listing_requests.fetch_add(1, Ordering::SeqCst);

        match self.service.list_directory(dir_id).await {
            FetchOutcome::Ready(listing) => listing,
            FetchOutcome::Empty => {
                debug!("Directory {} is empty or gone", dir_id);
                DirectoryListing::default()
            }
            FetchOutcome::Failed(reason) => {
                warn!("Failed to list {}: {}", dir_id, reason);
                self.status.set(Status::LoadFailed(dir_id.to_string()));
                DirectoryListing::default()
            }
        }
    }

    /// Add one hidden node per listed entry; returns how many were new
    fn materialize(&self, dir_id: &str, listing: &DirectoryListing) -> usize {
        let mut store = self.store.write();
        let parent = Some(dir_id.to_string());

        let entries = listing
            .directories
            .iter()
            .map(|name| (name, NodeKind::Directory))
            .chain(listing.files.iter().map(|name| (name, NodeKind::File)));

        let mut added = 0;
        for (name, kind) in entries {
            if name.is_empty() || name.contains(namespace::SEPARATOR) {
                warn!("Ignoring invalid entry {:?} under {}", name, dir_id);
                continue;
            }
            let id = namespace::child_id(dir_id, name);
            let node = match kind {
                NodeKind::Directory => Node::directory(id, parent.clone()),
                NodeKind::File => Node::file(id, parent.clone()),
            };
            if store.add_node(node.hidden()) {
                added += 1;
            }
        }
        added
    }

    // ------------------------------------------------------------------------
    // Recomputation
    // ------------------------------------------------------------------------

    /// Rebuild the aggregated edge set for the current visibility.
    ///
    /// If a pass is already running this returns `Coalesced` immediately and
    /// the running pass repeats once it finishes. Dropping an admitted pass
    /// before it commits leaves any coalesced request pending; the next call
    /// picks it up and [`needs_recompute`](Self::needs_recompute) reports it.
    pub async fn recompute(&self) -> RecomputeOutcome {
        let mut token = match self.gate.request() {
            Admission::Admitted(token) => token,
            Admission::Coalesced => {
                debug!("Recompute coalesced into in-flight pass");
                return RecomputeOutcome::Coalesced;
            }
        };

        let mut guard = PassGuard::new(&self.gate, token);
        let mut passes = 0;
        loop {
            passes += 1;
            let mut summary = self.run_pass(token).await;
            match self.gate.finish(token) {
                Completion::Again(next) => {
                    debug!("Visibility changed during pass {}, re-running", token);
                    token = next;
                    guard.advance(next);
                }
                Completion::Done => {
                    guard.disarm();
                    summary.passes = passes;
                    return RecomputeOutcome::Committed(summary);
                }
            }
        }
    }

    async fn run_pass(&self, token: u64) -> CommitSummary {
        let (visible, files) = {
            let store = self.store.read();
            (store.visible_ids(), store.visible_file_ids())
        };
        self.status.set(Status::Resolving);

        let bucket_ids = buckets_for(&visible);
        let (extracted, buckets) = tokio::join!(
            self.service.extract_edges(&files),
            self.service.fetch_buckets(&bucket_ids)
        );

        let mut failures = Vec::new();
        let extracted: ExtractedEdges = match extracted {
            FetchOutcome::Ready(edges) => edges,
            FetchOutcome::Empty => ExtractedEdges::new(),
            FetchOutcome::Failed(reason) => {
                warn!("Live extraction failed: {}", reason);
                failures.push(format!("extraction {}", reason));
                ExtractedEdges::new()
            }
        };
        let buckets: BucketIndex = match buckets {
            FetchOutcome::Ready(index) => index,
            FetchOutcome::Empty => BucketIndex::new(),
            FetchOutcome::Failed(reason) => {
                warn!("Bucket fetch failed: {}", reason);
                failures.push(format!("buckets {}", reason));
                BucketIndex::new()
            }
        };

        self.gate.begin_commit();
        let summary = {
            let mut store = self.store.write();
            let current = store.visible_ids();
            let aggregated = aggregate(&current, &extracted, &buckets);
            let stats = aggregated.stats();
            let edges = store.replace_links(aggregated.into_edges());
            CommitSummary {
                token,
                passes: 0,
                nodes: current.len(),
                edges,
                stats,
            }
        };

        info!(
            token,
            nodes = summary.nodes,
            edges = summary.edges,
            "Committed aggregated edges"
        );
        if failures.is_empty() {
            self.status.set(Status::Ready {
                nodes: summary.nodes,
                edges: summary.edges,
            });
        } else {
            self.status.set(Status::Degraded {
                nodes: summary.nodes,
                edges: summary.edges,
                reason: failures.join("; "),
            });
        }
        summary
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Select a node; returns the published namespace-relative path.
    ///
    /// Without a `root_prefix` the root is the first segment of `id`. A
    /// single-segment `id` is its own root and is published unchanged.
    pub fn select(&self, id: &str) -> Result<String> {
        let root = match &self.options.root_prefix {
            Some(prefix) => prefix.clone(),
            None => namespace::proper_ancestors(id)
                .last()
                .unwrap_or(id)
                .to_string(),
        };
        let mut store = self.store.write();
        self.selection.select(&mut store, id, &root)
    }

    pub fn clear_selection(&self) {
        let mut store = self.store.write();
        self.selection.clear(&mut store);
    }

    /// ID of the selected node
    pub fn selected(&self) -> Option<String> {
        self.selection.selected()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Option<String>> {
        self.selection.subscribe()
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    pub fn status(&self) -> Status {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Whether a coalesced request was left behind by a dropped pass
    pub fn needs_recompute(&self) -> bool {
        self.gate.is_pending()
    }

    pub fn directory_state(&self, id: &str) -> Option<DirectoryState> {
        self.loader.lock().directories.get(id)
    }

    /// Number of listing fetches issued so far
    pub fn listing_requests(&self) -> usize {
        self.listing_requests.load(Ordering::SeqCst)
    }
}

/// Show the children of `dir_id` and, recursively, of expanded child
/// directories. No-op while `dir_id` itself is hidden.
fn reveal(store: &mut GraphStore, directories: &DirectoryStates, dir_id: &str) {
    if !store.is_visible(dir_id) {
        return;
    }
    let mut stack = vec![dir_id.to_string()];
    while let Some(current) = stack.pop() {
        let children: Vec<(String, bool)> = store
            .children(&current)
            .iter()
            .map(|n| (n.id.clone(), n.is_directory()))
            .collect();
        for (child, is_directory) in children {
            store.set_hidden(&child, false);
            if is_directory && directories.is_expanded(&child) {
                stack.push(child);
            }
        }
    }
}
