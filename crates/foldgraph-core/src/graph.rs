//! Graph Store
//!
//! The node-and-edge model of a namespace being visualized:
//! - `Node`: a directory or file, identified by its hierarchical path
//! - `Edge`: an aggregated connection between two visible nodes
//! - `GraphStore`: petgraph-backed storage shared by the engine and the host UI
//!
//! The store holds two kinds of petgraph edges. `Contains` edges mirror the
//! namespace hierarchy and are never removed; nodes are never deleted either,
//! only hidden. `Link` edges are the aggregated edge set and are replaced as a
//! whole on every commit.

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::namespace;

// ============================================================================
// Kinds
// ============================================================================

/// Kind of namespace entry a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Directory; may have children
    Directory,
    /// File; never has children
    File,
}

impl NodeKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Directory => "directory",
            NodeKind::File => "file",
        }
    }
}

/// Types of petgraph edges held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Hierarchical containment (Directory→child)
    Contains,
    /// Aggregated connection between visible nodes
    Link,
}

impl EdgeType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Contains => "CONTAINS",
            EdgeType::Link => "LINK",
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// A node in the namespace graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Hierarchical node ID (e.g., "Notebook/A/x.md")
    pub id: String,

    /// Directory or file
    pub kind: NodeKind,

    /// Display name (last path segment)
    pub label: String,

    /// Parent node ID; `None` only for roots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Display suppressed because an ancestor is collapsed
    #[serde(default)]
    pub hidden: bool,

    /// Highlight style applied by the selection
    #[serde(default)]
    pub highlighted: bool,
}

impl Node {
    fn new(id: String, kind: NodeKind, parent_id: Option<String>) -> Self {
        let label = match namespace::local_name(&id) {
            "" => id.clone(),
            name => name.to_string(),
        };
        Self {
            id,
            kind,
            label,
            parent_id,
            hidden: false,
            highlighted: false,
        }
    }

    /// Create a directory node
    pub fn directory(id: impl Into<String>, parent_id: Option<String>) -> Self {
        Self::new(id.into(), NodeKind::Directory, parent_id)
    }

    /// Create a file node
    pub fn file(id: impl Into<String>, parent_id: Option<String>) -> Self {
        Self::new(id.into(), NodeKind::File, parent_id)
    }

    /// Start hidden (for children materialized under a collapsed directory)
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Check if this is a directory node
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Check if this is a file node
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Check if this node is currently displayed
    pub fn is_visible(&self) -> bool {
        !self.hidden
    }
}

// ============================================================================
// Edge
// ============================================================================

/// Derive the edge ID for a directed pair.
pub fn edge_id(source: &str, target: &str) -> String {
    format!("e:{}->{}", source, target)
}

/// An aggregated edge between two visible nodes.
///
/// The ID is always derived from the endpoints, so two edges with the same
/// `(source, target)` pair are indistinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    /// Derived ID: `e:{source}->{target}`
    pub id: String,

    /// Source node ID
    pub source: String,

    /// Target node ID
    pub target: String,
}

impl Edge {
    /// Create an edge, deriving its ID
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: edge_id(&source, &target),
            source,
            target,
        }
    }

    /// The deduplication key
    pub fn key(&self) -> (&str, &str) {
        (&self.source, &self.target)
    }
}

/// Edge weight stored in petgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeData {
    /// Relationship type
    pub edge_type: EdgeType,
}

impl EdgeData {
    /// Containment edge data
    pub fn contains() -> Self {
        Self {
            edge_type: EdgeType::Contains,
        }
    }

    /// Aggregated link edge data
    pub fn link() -> Self {
        Self {
            edge_type: EdgeType::Link,
        }
    }
}

// ============================================================================
// GraphStore
// ============================================================================

/// Petgraph-backed store of namespace nodes and aggregated edges.
///
/// Owned by the caller and shared with the engine (typically behind
/// `Arc<parking_lot::RwLock<GraphStore>>`). Mutations that must appear atomic
/// to readers, such as [`GraphStore::replace_links`], happen within a single
/// `&mut self` call, so a reader holding the lock never observes a partially
/// replaced edge set.
#[derive(Debug, Clone)]
pub struct GraphStore {
    /// The underlying petgraph instance
    graph: StableGraph<Node, EdgeData, petgraph::Directed>,

    /// Map from node ID to petgraph NodeIndex for O(1) lookup
    node_index_map: HashMap<String, NodeIndex>,

    /// Incremented on every link replacement
    link_generation: u64,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            node_index_map: HashMap::new(),
            link_generation: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Node Operations
    // ------------------------------------------------------------------------

    /// Add a node unless one with the same ID already exists.
    ///
    /// Returns `true` if the node was inserted. When the parent is present a
    /// containment edge is linked to it.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.node_index_map.contains_key(&node.id) {
            return false;
        }

        let node_id = node.id.clone();
        let parent_idx = node
            .parent_id
            .as_deref()
            .and_then(|p| self.node_index_map.get(p).copied());

        let idx = self.graph.add_node(node);
        self.node_index_map.insert(node_id, idx);

        if let Some(parent_idx) = parent_idx {
            self.graph.add_edge(parent_idx, idx, EdgeData::contains());
        }
        true
    }

    /// Get a node by its ID
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.node_index_map
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    fn get_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.node_index_map
            .get(id)
            .copied()
            .and_then(|idx| self.graph.node_weight_mut(idx))
    }

    /// Check if the store contains a node with the given ID
    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index_map.contains_key(id)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Iterate over all nodes
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Get the direct children of a node, sorted by ID
    pub fn children(&self, id: &str) -> Vec<&Node> {
        let Some(&idx) = self.node_index_map.get(id) else {
            return Vec::new();
        };
        let mut children: Vec<&Node> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight().edge_type == EdgeType::Contains)
            .filter_map(|e| self.graph.node_weight(e.target()))
            .collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        children
    }

    /// Get every descendant ID of a node (depth-first, excluding the node)
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut stack: Vec<String> = self.children(id).iter().map(|n| n.id.clone()).collect();
        while let Some(current) = stack.pop() {
            stack.extend(self.children(&current).iter().map(|n| n.id.clone()));
            result.push(current);
        }
        result
    }

    // ------------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------------

    /// Show or hide a node. Returns `false` if the node does not exist.
    pub fn set_hidden(&mut self, id: &str, hidden: bool) -> bool {
        match self.get_node_mut(id) {
            Some(node) => {
                node.hidden = hidden;
                true
            }
            None => false,
        }
    }

    /// Check if a node exists and is displayed
    pub fn is_visible(&self, id: &str) -> bool {
        self.get_node(id).is_some_and(Node::is_visible)
    }

    /// Snapshot of the visible-node set
    pub fn visible_ids(&self) -> HashSet<String> {
        self.graph
            .node_weights()
            .filter(|n| n.is_visible())
            .map(|n| n.id.clone())
            .collect()
    }

    /// Visible file node IDs, sorted
    pub fn visible_file_ids(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .graph
            .node_weights()
            .filter(|n| n.is_visible() && n.is_file())
            .map(|n| n.id.clone())
            .collect();
        files.sort();
        files
    }

    /// Number of visible nodes
    pub fn visible_count(&self) -> usize {
        self.graph.node_weights().filter(|n| n.is_visible()).count()
    }

    // ------------------------------------------------------------------------
    // Highlight
    // ------------------------------------------------------------------------

    /// Apply or clear the highlight style. Returns `false` if the node does not exist.
    pub fn set_highlighted(&mut self, id: &str, highlighted: bool) -> bool {
        match self.get_node_mut(id) {
            Some(node) => {
                node.highlighted = highlighted;
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Aggregated Edges
    // ------------------------------------------------------------------------

    fn add_link(&mut self, source_id: &str, target_id: &str) -> Option<EdgeIndex> {
        let source_idx = self.node_index_map.get(source_id)?;
        let target_idx = self.node_index_map.get(target_id)?;
        Some(
            self.graph
                .add_edge(*source_idx, *target_idx, EdgeData::link()),
        )
    }

    /// Replace the whole aggregated edge set.
    ///
    /// Removes every `Link` edge and inserts the given edges in one call.
    /// Edges whose endpoints are not in the store are skipped. Returns the
    /// number of edges inserted.
    pub fn replace_links<I>(&mut self, edges: I) -> usize
    where
        I: IntoIterator<Item = Edge>,
    {
        self.graph.retain_edges(|g, e| {
            g.edge_weight(e)
                .is_none_or(|data| data.edge_type != EdgeType::Link)
        });

        let mut inserted = 0;
        for edge in edges {
            if self.add_link(&edge.source, &edge.target).is_some() {
                inserted += 1;
            } else {
                debug!("Skipping edge with unknown endpoint: {}", edge.id);
            }
        }

        self.link_generation += 1;
        inserted
    }

    /// Iterate over the current aggregated edges
    pub fn links(&self) -> impl Iterator<Item = Edge> + '_ {
        self.graph.edge_references().filter_map(move |edge_ref| {
            if edge_ref.weight().edge_type != EdgeType::Link {
                return None;
            }
            let source = self.graph.node_weight(edge_ref.source())?;
            let target = self.graph.node_weight(edge_ref.target())?;
            Some(Edge::new(source.id.clone(), target.id.clone()))
        })
    }

    /// Number of aggregated edges
    pub fn link_count(&self) -> usize {
        self.graph
            .edge_references()
            .filter(|e| e.weight().edge_type == EdgeType::Link)
            .count()
    }

    /// Number of times the aggregated edge set has been replaced
    pub fn link_generation(&self) -> u64 {
        self.link_generation
    }

    // ------------------------------------------------------------------------
    // Low-level Access (for advanced use cases)
    // ------------------------------------------------------------------------

    /// Get a reference to the underlying petgraph
    pub fn inner(&self) -> &StableGraph<Node, EdgeData, petgraph::Directed> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> GraphStore {
        let mut store = GraphStore::new();
        store.add_node(Node::directory("R", None));
        store.add_node(Node::directory("R/A", Some("R".into())));
        store.add_node(Node::file("R/A/x", Some("R/A".into())));
        store.add_node(Node::file("R/A/y", Some("R/A".into())));
        store.add_node(Node::file("R/B", Some("R".into())));
        store
    }

    #[test]
    fn test_node_kind_serialization() {
        let json = serde_json::to_string(&NodeKind::Directory).unwrap();
        assert_eq!(json, "\"directory\"");
        let json = serde_json::to_string(&EdgeType::Link).unwrap();
        assert_eq!(json, "\"LINK\"");
    }

    #[test]
    fn test_node_label_is_local_name() {
        let node = Node::file("Notebook/A/x.md", Some("Notebook/A".into()));
        assert_eq!(node.label, "x.md");
        assert!(node.is_file());
        assert!(node.is_visible());

        let root = Node::directory("Notebook", None);
        assert_eq!(root.label, "Notebook");
        assert!(root.parent_id.is_none());
    }

    #[test]
    fn test_edge_id_is_derived() {
        let edge = Edge::new("R/A/x", "R/B");
        assert_eq!(edge.id, "e:R/A/x->R/B");
        assert_eq!(edge.key(), ("R/A/x", "R/B"));
        assert_eq!(edge, Edge::new("R/A/x".to_string(), "R/B".to_string()));
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut store = sample_store();
        assert_eq!(store.node_count(), 5);

        assert!(!store.add_node(Node::file("R/B", Some("R".into()))));
        assert_eq!(store.node_count(), 5);
    }

    #[test]
    fn test_children_and_descendants() {
        let store = sample_store();

        let children: Vec<&str> = store.children("R").iter().map(|n| n.id.as_str()).collect();
        assert_eq!(children, vec!["R/A", "R/B"]);

        let mut descendants = store.descendants("R/A");
        descendants.sort();
        assert_eq!(descendants, vec!["R/A/x", "R/A/y"]);

        assert!(store.children("R/A/x").is_empty());
        assert!(store.children("missing").is_empty());
    }

    #[test]
    fn test_visibility() {
        let mut store = sample_store();
        assert!(store.set_hidden("R/A/x", true));
        assert!(!store.set_hidden("missing", true));

        assert!(!store.is_visible("R/A/x"));
        assert!(store.is_visible("R/A/y"));
        assert!(!store.is_visible("missing"));
        assert_eq!(store.visible_count(), 4);
        assert!(!store.visible_ids().contains("R/A/x"));
        assert_eq!(store.visible_file_ids(), vec!["R/A/y", "R/B"]);
    }

    #[test]
    fn test_replace_links_swaps_whole_set() {
        let mut store = sample_store();

        let inserted = store.replace_links(vec![Edge::new("R/A/x", "R/B"), Edge::new("R/A/y", "R/B")]);
        assert_eq!(inserted, 2);
        assert_eq!(store.link_count(), 2);
        assert_eq!(store.link_generation(), 1);

        let inserted = store.replace_links(vec![Edge::new("R/A", "R/B")]);
        assert_eq!(inserted, 1);
        let links: Vec<Edge> = store.links().collect();
        assert_eq!(links, vec![Edge::new("R/A", "R/B")]);
        assert_eq!(store.link_generation(), 2);

        // Containment edges survive replacement
        assert_eq!(store.children("R/A").len(), 2);
    }

    #[test]
    fn test_replace_links_skips_unknown_endpoints() {
        let mut store = sample_store();
        let inserted = store.replace_links(vec![Edge::new("R/A/x", "R/missing")]);
        assert_eq!(inserted, 0);
        assert_eq!(store.link_count(), 0);
    }

    #[test]
    fn test_highlight() {
        let mut store = sample_store();
        assert!(store.set_highlighted("R/B", true));
        assert!(store.get_node("R/B").unwrap().highlighted);
        assert!(!store.set_highlighted("missing", true));
    }
}
