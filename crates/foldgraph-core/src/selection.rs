//! Single-slot node selection.
//!
//! Independent of aggregation; it only touches the highlight flag of nodes in
//! the store and publishes the selected node's namespace-relative path.

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{EngineError, Result};
use crate::graph::GraphStore;
use crate::namespace;

/// The current selection and its published path.
#[derive(Debug)]
pub struct SelectionState {
    current: Mutex<Option<String>>,
    tx: watch::Sender<Option<String>>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            current: Mutex::new(None),
            tx,
        }
    }

    /// Select a node, replacing any previous selection.
    ///
    /// Returns the published path (the ID relative to `root`).
    pub fn select(&self, store: &mut GraphStore, id: &str, root: &str) -> Result<String> {
        if !store.contains_node(id) {
            return Err(EngineError::node_not_found(id));
        }

        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            store.set_highlighted(&previous, false);
        }
        store.set_highlighted(id, true);
        *current = Some(id.to_string());

        let path = namespace::relative_path(id, root).to_string();
        self.tx.send_replace(Some(path.clone()));
        Ok(path)
    }

    /// Clear the selection and its highlight
    pub fn clear(&self, store: &mut GraphStore) {
        if let Some(previous) = self.current.lock().take() {
            store.set_highlighted(&previous, false);
        }
        self.tx.send_replace(None);
    }

    /// ID of the selected node
    pub fn selected(&self) -> Option<String> {
        self.current.lock().clone()
    }

    /// Receive published paths
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}
