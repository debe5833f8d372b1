//! FoldGraph Core - Collapsible namespace graphs with aggregated edges
//!
//! This crate renders a file/directory namespace as a node-and-edge graph
//! where collapsing a directory redirects every edge that touched a hidden
//! descendant onto the directory itself:
//! - Petgraph-backed node store with structural and aggregated edges
//! - Lazy, one-level-at-a-time directory loading
//! - Nearest-visible-ancestor resolution of raw edge endpoints
//! - Deduplicating aggregation of live-extracted and bucketed edges
//! - Coalesced recomputation on every visibility change

pub mod aggregator;
pub mod bucket;
pub mod engine;
pub mod error;
pub mod graph;
pub mod namespace;
pub mod recompute;
pub mod resolver;
pub mod selection;
pub mod source;
pub mod state;
pub mod status;

// Re-exports for convenience
pub use aggregator::{aggregate, AggregatedEdges, AggregationStats};
pub use bucket::{
    bucket_file, bucket_id, bucket_symbol, buckets_for, Bucket, BucketCache, BucketIndex,
    CacheMetrics, CachedBuckets, EdgeRecord,
};
pub use engine::{EngineOptions, GraphEngine};
pub use error::{EngineError, Result};
pub use graph::{edge_id, Edge, EdgeData, EdgeType, GraphStore, Node, NodeKind};
pub use recompute::{CommitSummary, RecomputeGate, RecomputeOutcome, RecomputePhase};
pub use resolver::nearest_visible_ancestor;
pub use selection::SelectionState;
pub use source::{DirectoryListing, ExtractedEdges, FetchOutcome, NamespaceService};
pub use state::{DirectoryState, DirectoryStates};
pub use status::{Status, StatusSink};
