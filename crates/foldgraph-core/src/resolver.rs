//! Nearest-visible-ancestor resolution.
//!
//! Collapsing a directory hides its descendants but keeps their nodes, so an
//! edge that points into a collapsed subtree is redirected to the closest
//! ancestor that is still on screen.

use std::collections::HashSet;

use crate::namespace;

/// Resolve a raw node ID against the visible-node set.
///
/// Returns the ID itself when visible, otherwise the deepest proper prefix
/// that is visible, otherwise `None` (the candidate edge is dropped).
///
/// # Examples
/// ```
/// use std::collections::HashSet;
/// use foldgraph_core::resolver::nearest_visible_ancestor;
///
/// let visible: HashSet<String> = ["R", "R/A"].iter().map(|s| s.to_string()).collect();
/// assert_eq!(nearest_visible_ancestor("R/A/x", &visible), Some("R/A"));
/// assert_eq!(nearest_visible_ancestor("Q/x", &visible), None);
/// ```
pub fn nearest_visible_ancestor<'a>(raw_id: &'a str, visible: &HashSet<String>) -> Option<&'a str> {
    if visible.contains(raw_id) {
        return Some(raw_id);
    }
    namespace::proper_ancestors(raw_id).find(|prefix| visible.contains(*prefix))
}
