//! Link scanning for namespace files.
//!
//! Finds references in markup (`href`, `src`, `srcset`, ...) and Markdown
//! (`[text](target)`) and resolves them to namespace-relative paths of files
//! that actually exist.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Extensions whose content is scanned for links
pub const SCANNABLE_EXTENSIONS: &[&str] = &["html", "htm", "php", "xhtml", "md"];

static ATTRIBUTE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(href|src|data|action|data-src|srcset)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#,
    )
    .expect("attribute link pattern is valid")
});

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)
        .expect("markdown link pattern is valid")
});

/// How a file's content is scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// HTML-family markup: link-bearing attributes
    Markup,
    /// Markdown: inline links and images
    Markdown,
}

impl ContentKind {
    /// Classify a path by extension; `None` means not scannable
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" => Some(Self::Markdown),
            e if SCANNABLE_EXTENSIONS.contains(&e) => Some(Self::Markup),
            _ => None,
        }
    }
}

/// Whether a link points outside the namespace
pub fn is_external(link: &str) -> bool {
    ["http://", "https://", "//", "mailto:", "javascript:", "#", "data:"]
        .iter()
        .any(|prefix| link.starts_with(prefix))
}

/// Normalize a raw link value.
///
/// Drops external links, strips a leading `/` and the root prefix, and cuts
/// any fragment or query (unless it starts the link).
///
/// # Examples
/// ```
/// use foldgraph_backend::links::normalize_link;
///
/// assert_eq!(normalize_link("/Notebook/a.md#top", "Notebook"), Some("a.md".to_string()));
/// assert_eq!(normalize_link("https://example.com", "Notebook"), None);
/// ```
pub fn normalize_link(link: &str, root_prefix: &str) -> Option<String> {
    let mut normalized = link.trim();
    if normalized.is_empty() || is_external(normalized) {
        return None;
    }

    normalized = normalized.strip_prefix('/').unwrap_or(normalized);
    if let Some(rest) = normalized
        .strip_prefix(root_prefix)
        .and_then(|r| r.strip_prefix('/'))
    {
        normalized = rest;
    }

    for delimiter in ['#', '?'] {
        if let Some(idx) = normalized.find(delimiter) {
            if idx > 0 {
                normalized = &normalized[..idx];
            }
        }
    }

    (!normalized.is_empty()).then(|| normalized.to_string())
}

/// Scan content for normalized links, deduplicated in first-seen order.
pub fn scan_links(content: &str, kind: ContentKind, root_prefix: &str) -> Vec<String> {
    let mut raw: Vec<&str> = Vec::new();
    match kind {
        ContentKind::Markup => {
            for caps in ATTRIBUTE_LINK.captures_iter(content) {
                let Some(value) = caps.get(2).or(caps.get(3)).or(caps.get(4)) else {
                    continue;
                };
                if caps[1].eq_ignore_ascii_case("srcset") {
                    raw.extend(
                        value
                            .as_str()
                            .split(',')
                            .filter_map(|part| part.split_whitespace().next()),
                    );
                } else {
                    raw.push(value.as_str());
                }
            }
        }
        ContentKind::Markdown => {
            raw.extend(
                MARKDOWN_LINK
                    .captures_iter(content)
                    .filter_map(|caps| caps.get(1).map(|m| m.as_str())),
            );
        }
    }

    let mut links: Vec<String> = Vec::new();
    for link in raw.into_iter().filter_map(|l| normalize_link(l, root_prefix)) {
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

/// Join `link` onto a namespace-relative base directory, lexically.
///
/// Returns `None` when `..` would climb above the namespace root.
pub fn join_relative(base_dir: &str, link: &str) -> Option<String> {
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in link.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Resolve normalized links of `file_rel` to existing namespace-relative paths.
///
/// Each link is tried relative to the file's directory and relative to the
/// namespace root; every candidate that exists is kept, except the file
/// itself.
pub fn resolve_links(namespace_dir: &Path, file_rel: &str, links: &[String]) -> Vec<String> {
    let file_dir = file_rel.rsplit_once('/').map_or("", |(dir, _)| dir);
    let mut resolved: Vec<String> = Vec::new();

    for link in links {
        let candidates = [join_relative(file_dir, link), join_relative("", link)];
        for candidate in candidates.into_iter().flatten() {
            if candidate.is_empty() || candidate == file_rel || resolved.contains(&candidate) {
                continue;
            }
            if namespace_dir.join(&candidate).exists() {
                resolved.push(candidate);
            }
        }
    }
    resolved
}

/// Read one file and return the namespace-relative paths it links to.
///
/// Files that are not scannable yield an empty list.
pub fn file_links(
    namespace_dir: &Path,
    file_rel: &str,
    root_prefix: &str,
) -> std::io::Result<Vec<String>> {
    let Some(kind) = ContentKind::from_path(file_rel) else {
        return Ok(Vec::new());
    };
    let path = namespace_dir.join(file_rel);
    if path.is_dir() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)?;
    let links = scan_links(&content, kind, root_prefix);
    Ok(resolve_links(namespace_dir, file_rel, &links))
}
