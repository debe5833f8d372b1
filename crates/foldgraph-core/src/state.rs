//! Per-directory expansion state.

use std::collections::HashMap;

/// Expansion state of one directory node.
///
/// Created on the first expand or collapse of a directory and kept for the
/// rest of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryState {
    /// Descendants are meant to be shown
    pub expanded: bool,
    /// The one-level listing has completed at least once (never reset)
    pub children_loaded: bool,
}

/// Table of [`DirectoryState`] keyed by directory ID.
#[derive(Debug, Default, Clone)]
pub struct DirectoryStates {
    states: HashMap<String, DirectoryState>,
}

impl DirectoryStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the state for a directory, creating the default on first touch
    pub fn entry(&mut self, id: &str) -> &mut DirectoryState {
        self.states.entry(id.to_string()).or_default()
    }

    /// Get the state without creating it
    pub fn get(&self, id: &str) -> Option<DirectoryState> {
        self.states.get(id).copied()
    }

    /// Mark a directory's children as loaded.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn mark_loaded(&mut self, id: &str) -> bool {
        let state = self.entry(id);
        let first = !state.children_loaded;
        state.children_loaded = true;
        first
    }

    pub fn set_expanded(&mut self, id: &str, expanded: bool) {
        self.entry(id).expanded = expanded;
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.states.get(id).is_some_and(|s| s.expanded)
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.states.get(id).is_some_and(|s| s.children_loaded)
    }

    /// Number of tracked directories
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
