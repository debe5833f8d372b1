//! Status text sink.
//!
//! Purely observational: the engine publishes what it is doing and consumers
//! render it however they like.

use std::fmt;
use tokio::sync::watch;
use tracing::debug;

/// Engine status as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    /// Fetching the listing of a directory
    Loading(String),
    /// Fetching and aggregating edges
    Resolving,
    Ready {
        nodes: usize,
        edges: usize,
    },
    /// Committed, but at least one edge source failed
    Degraded {
        nodes: usize,
        edges: usize,
        reason: String,
    },
    /// Listing a directory failed; it was treated as empty
    LoadFailed(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "Idle"),
            Status::Loading(id) => write!(f, "Loading {}...", id),
            Status::Resolving => write!(f, "Resolving edges..."),
            Status::Ready { nodes, edges } => {
                write!(f, "Ready — {} nodes, {} edges", nodes, edges)
            }
            Status::Degraded {
                nodes,
                edges,
                reason,
            } => write!(
                f,
                "Ready — {} nodes, {} edges (partial: {})",
                nodes, edges, reason
            ),
            Status::LoadFailed(id) => write!(f, "Failed to load {}", id),
        }
    }
}

/// Publishes [`Status`] updates on a watch channel.
#[derive(Debug)]
pub struct StatusSink {
    tx: watch::Sender<Status>,
}

impl Default for StatusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Status::Idle);
        Self { tx }
    }

    /// Publish a new status (kept even with no subscribers)
    pub fn set(&self, status: Status) {
        debug!(status = %status, "Status");
        self.tx.send_replace(status);
    }

    pub fn current(&self) -> Status {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.tx.subscribe()
    }
}
