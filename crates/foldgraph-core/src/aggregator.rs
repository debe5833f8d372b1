//! Edge Aggregation
//!
//! Folds the three raw edge sources into one deduplicated edge set against a
//! fixed visible-node set:
//!
//! ```text
//! live extraction   (source file ──► raw target)   source must be visible
//! outgoing buckets  (visible s  ──► raw target)
//! incoming buckets  (raw source ──► visible t)
//!            │
//!            ▼  resolve raw endpoints to nearest visible ancestor
//!     BTreeMap<(source, target), Edge>   no self-loops, one edge per pair
//! ```
//!
//! The sources are a permissive union. Nothing is authoritative; a pair
//! reported by several sources appears once.

use std::collections::{BTreeMap, HashSet};

use tracing::trace;

use crate::bucket::BucketIndex;
use crate::graph::Edge;
use crate::resolver::nearest_visible_ancestor;
use crate::source::ExtractedEdges;

/// Counters describing one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    /// Candidates from live extraction
    pub live: usize,
    /// Candidates from outgoing bucket records
    pub outgoing: usize,
    /// Candidates from incoming bucket records
    pub incoming: usize,
    /// Live groups discarded because their source is hidden
    pub hidden_sources: usize,
    /// Candidates with no visible ancestor
    pub unresolved: usize,
    /// Candidates that resolved onto a single node
    pub self_loops: usize,
    /// Candidates already present
    pub duplicates: usize,
}

/// Deduplicated aggregated edges in `(source, target)` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedEdges {
    edges: BTreeMap<(String, String), Edge>,
    stats: AggregationStats,
}

impl AggregatedEdges {
    fn insert(&mut self, source: &str, target: &str) {
        if source == target {
            self.stats.self_loops += 1;
            return;
        }
        let key = (source.to_string(), target.to_string());
        if self.edges.contains_key(&key) {
            self.stats.duplicates += 1;
            return;
        }
        self.edges.insert(key, Edge::new(source, target));
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, source: &str, target: &str) -> bool {
        self.edges
            .contains_key(&(source.to_string(), target.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn stats(&self) -> AggregationStats {
        self.stats
    }

    pub fn into_edges(self) -> Vec<Edge> {
        self.edges.into_values().collect()
    }
}

/// Aggregate live and bucket edges against a visible-node set.
///
/// Pure and synchronous: the same inputs always give the same output.
pub fn aggregate(
    visible: &HashSet<String>,
    extracted: &ExtractedEdges,
    buckets: &BucketIndex,
) -> AggregatedEdges {
    let mut out = AggregatedEdges::default();

    for (source, targets) in extracted {
        if !visible.contains(source) {
            out.stats.hidden_sources += 1;
            continue;
        }
        for raw in targets {
            out.stats.live += 1;
            match nearest_visible_ancestor(raw, visible) {
                Some(target) => out.insert(source, target),
                None => out.stats.unresolved += 1,
            }
        }
    }

    for id in visible {
        for raw in buckets.outgoing(id) {
            out.stats.outgoing += 1;
            match nearest_visible_ancestor(raw, visible) {
                Some(target) => out.insert(id, target),
                None => out.stats.unresolved += 1,
            }
        }
        for raw in buckets.incoming(id) {
            out.stats.incoming += 1;
            match nearest_visible_ancestor(raw, visible) {
                Some(source) => out.insert(source, id),
                None => out.stats.unresolved += 1,
            }
        }
    }

    trace!(edges = out.len(), stats = ?out.stats, "Aggregated edges");
    out
}
