//! Hierarchical Node IDs
//!
//! Every node ID doubles as a `/`-separated namespace path: `Notebook/A/x.md`
//! has parent `Notebook/A` and local name `x.md`. These helpers are the only
//! place that knows about the separator.

/// Path segment separator used in node IDs.
pub const SEPARATOR: char = '/';

/// Get the parent ID (the ID minus its last segment).
///
/// Returns `None` for single-segment IDs (namespace roots).
///
/// # Examples
/// ```
/// use foldgraph_core::namespace::parent_id;
///
/// assert_eq!(parent_id("Notebook/A/x.md"), Some("Notebook/A"));
/// assert_eq!(parent_id("Notebook"), None);
/// ```
pub fn parent_id(id: &str) -> Option<&str> {
    id.rfind(SEPARATOR).map(|pos| &id[..pos])
}

/// Get the local name (last segment) of an ID.
pub fn local_name(id: &str) -> &str {
    match id.rfind(SEPARATOR) {
        Some(pos) => &id[pos + 1..],
        None => id,
    }
}

/// Build the ID of a direct child.
pub fn child_id(parent: &str, name: &str) -> String {
    format!("{}{}{}", parent, SEPARATOR, name)
}

/// Iterate over the proper ancestors of an ID, deepest first.
///
/// `a/b/c` yields `a/b` then `a`.
pub fn proper_ancestors(id: &str) -> impl Iterator<Item = &str> {
    let mut current = id;
    std::iter::from_fn(move || {
        let parent = parent_id(current)?;
        current = parent;
        Some(parent)
    })
}

/// Check whether `id` lies strictly below `ancestor`.
pub fn is_descendant(id: &str, ancestor: &str) -> bool {
    id.len() > ancestor.len()
        && id.starts_with(ancestor)
        && id[ancestor.len()..].starts_with(SEPARATOR)
}

/// Strip the root prefix from an ID, giving the namespace-relative path.
///
/// IDs outside the root are returned unchanged.
pub fn relative_path<'a>(id: &'a str, root: &str) -> &'a str {
    if is_descendant(id, root) {
        &id[root.len() + 1..]
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_id() {
        assert_eq!(parent_id("R/A/x"), Some("R/A"));
        assert_eq!(parent_id("R/A"), Some("R"));
        assert_eq!(parent_id("R"), None);
        assert_eq!(parent_id(""), None);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("R/A/x.md"), "x.md");
        assert_eq!(local_name("R"), "R");
        assert_eq!(local_name("R/"), "");
    }

    #[test]
    fn test_child_id() {
        assert_eq!(child_id("R/A", "x"), "R/A/x");
    }

    #[test]
    fn test_proper_ancestors_deepest_first() {
        let ancestors: Vec<&str> = proper_ancestors("R/A/B/x").collect();
        assert_eq!(ancestors, vec!["R/A/B", "R/A", "R"]);
        assert_eq!(proper_ancestors("R").count(), 0);
    }

    #[test]
    fn test_is_descendant_respects_segment_boundary() {
        assert!(is_descendant("R/A/x", "R/A"));
        assert!(is_descendant("R/A/x", "R"));
        assert!(!is_descendant("R/AB", "R/A"));
        assert!(!is_descendant("R/A", "R/A"));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("Notebook/A/x.md", "Notebook"), "A/x.md");
        assert_eq!(relative_path("Other/x.md", "Notebook"), "Other/x.md");
        assert_eq!(relative_path("Notebook", "Notebook"), "Notebook");
    }
}
