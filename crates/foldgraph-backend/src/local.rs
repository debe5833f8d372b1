//! Local backend implementation.
//!
//! Serves a namespace straight from disk:
//! - directory listings from the namespace directory
//! - live edges by scanning file contents (see [`crate::links`])
//! - pre-computed buckets from `{edges_dir}/{symbol}.json`

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use foldgraph_config::FoldConfig;
use foldgraph_core::bucket::{bucket_id, extend_unique, Bucket, BucketIndex, EdgeRecord};
use foldgraph_core::namespace;
use foldgraph_core::source::{DirectoryListing, ExtractedEdges, FetchOutcome, NamespaceService};
use tracing::{debug, info, warn};

use crate::error::BackendError;
use crate::links;

/// Local backend with direct file system access.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    /// ID of the namespace root node
    root_id: String,

    /// Directory the root node maps to
    namespace_dir: PathBuf,

    /// Directory holding bucket files
    edges_dir: PathBuf,

    /// Lowercase extensions exposed by listings (empty = all)
    extensions: Vec<String>,
}

impl LocalBackend {
    /// Create a local backend exposing every file.
    pub fn new(
        root_id: impl Into<String>,
        namespace_dir: impl Into<PathBuf>,
        edges_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root_id: root_id.into(),
            namespace_dir: namespace_dir.into(),
            edges_dir: edges_dir.into(),
            extensions: Vec::new(),
        }
    }

    /// Restrict listed files to these extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Create a local backend from configuration.
    ///
    /// # Arguments
    /// * `config` - FoldGraph configuration
    /// * `workspace_root` - Directory relative paths in the config resolve against
    pub fn from_config(
        config: &FoldConfig,
        workspace_root: impl AsRef<Path>,
    ) -> Result<Self, BackendError> {
        let workspace_root = workspace_root.as_ref();
        let namespace_dir = config.namespace_dir(workspace_root);
        if !namespace_dir.is_dir() {
            return Err(BackendError::namespace_not_found(namespace_dir));
        }

        info!(
            "Local backend: {} -> {}",
            config.namespace.root_id,
            namespace_dir.display()
        );

        Ok(Self::new(
            config.namespace.root_id.clone(),
            namespace_dir,
            config.edges_dir(workspace_root),
        )
        .with_extensions(&config.namespace.file_extensions))
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn namespace_dir(&self) -> &Path {
        &self.namespace_dir
    }

    pub fn edges_dir(&self) -> &Path {
        &self.edges_dir
    }

    /// Whether a file name passes the extension allow-list.
    pub fn allows(&self, file_name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Namespace-relative path of a node ID (empty for the root).
    ///
    /// Rejects IDs outside the root and any `.`/`..`/empty segment.
    pub fn relative(&self, id: &str) -> Result<String, BackendError> {
        if id == self.root_id {
            return Ok(String::new());
        }
        if !namespace::is_descendant(id, &self.root_id) {
            return Err(BackendError::invalid_node_id(
                id,
                format!("not under namespace root '{}'", self.root_id),
            ));
        }
        let rel = namespace::relative_path(id, &self.root_id);
        if rel
            .split(namespace::SEPARATOR)
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(BackendError::invalid_node_id(id, "escapes the namespace"));
        }
        Ok(rel.to_string())
    }

    /// Node ID of a namespace-relative path.
    pub fn node_id(&self, rel: &str) -> String {
        if rel.is_empty() {
            self.root_id.clone()
        } else {
            namespace::child_id(&self.root_id, rel)
        }
    }

    /// Filesystem path of a node ID.
    pub fn fs_path(&self, id: &str) -> Result<PathBuf, BackendError> {
        let rel = self.relative(id)?;
        Ok(if rel.is_empty() {
            self.namespace_dir.clone()
        } else {
            self.namespace_dir.join(rel)
        })
    }

    /// Path of a bucket file.
    ///
    /// Files are named by the decoded symbol, so bucket `%C3%A9` lives in
    /// `é.json`.
    pub fn bucket_path(&self, bucket_id: &str) -> PathBuf {
        let symbol = match urlencoding::decode(bucket_id) {
            Ok(symbol) if !symbol.contains(['/', '\\']) => symbol.into_owned(),
            _ => bucket_id.to_string(),
        };
        self.edges_dir.join(format!("{}.json", symbol))
    }

    /// Read one bucket; a missing file is an empty bucket.
    pub async fn read_bucket(&self, bucket_id: &str) -> Result<Bucket, BackendError> {
        let path = self.bucket_path(bucket_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Bucket::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write one bucket, creating the edges directory if needed.
    pub async fn write_bucket(&self, bucket_id: &str, bucket: &Bucket) -> Result<(), BackendError> {
        let path = self.bucket_path(bucket_id);
        tokio::fs::create_dir_all(&self.edges_dir).await?;
        tokio::fs::write(&path, bucket_json(bucket)?)
            .await
            .map_err(|e| {
                BackendError::with_context(format!("writing {}", path.display()), e.to_string())
            })
    }

    /// Read the stored record of a node (empty when absent).
    pub async fn read_record(&self, id: &str) -> Result<EdgeRecord, BackendError> {
        let bucket = self.read_bucket(&bucket_id(id)).await?;
        Ok(bucket.get(id).cloned().unwrap_or_default())
    }

    /// Replace the stored record of a node.
    ///
    /// Both lists are deduplicated keeping first-seen order.
    pub async fn upsert_record(
        &self,
        id: &str,
        edges_from: Vec<String>,
        edges_to: Vec<String>,
    ) -> Result<EdgeRecord, BackendError> {
        self.relative(id)?;
        let mut record = EdgeRecord::default();
        extend_unique(&mut record.edges_from, edges_from);
        extend_unique(&mut record.edges_to, edges_to);

        let bucket_id = bucket_id(id);
        let mut bucket = self.read_bucket(&bucket_id).await?;
        bucket.insert(id.to_string(), record.clone());
        self.write_bucket(&bucket_id, &bucket).await?;
        debug!("Stored record for {} in bucket {}", id, bucket_id);
        Ok(record)
    }

    /// Record a link `source → target` in both nodes' records.
    pub async fn add_edge(&self, source: &str, target: &str) -> Result<(), BackendError> {
        self.relative(source)?;
        self.relative(target)?;
        if source == target {
            return Err(BackendError::with_context(
                format!("linking '{}'", source),
                "source and target are the same node",
            ));
        }

        self.patch_record(source, |record| {
            extend_unique(&mut record.edges_from, [target.to_string()])
        })
        .await?;
        self.patch_record(target, |record| {
            extend_unique(&mut record.edges_to, [source.to_string()])
        })
        .await?;

        info!("Linked {} -> {}", source, target);
        Ok(())
    }

    async fn patch_record<F>(&self, id: &str, patch: F) -> Result<(), BackendError>
    where
        F: FnOnce(&mut EdgeRecord),
    {
        let bucket_id = bucket_id(id);
        let mut bucket = self.read_bucket(&bucket_id).await?;
        patch(bucket.entry(id.to_string()).or_default());
        self.write_bucket(&bucket_id, &bucket).await
    }
}

/// Serialize a bucket with sorted keys so rewrites are stable.
pub(crate) fn bucket_json(bucket: &Bucket) -> Result<String, BackendError> {
    let sorted: BTreeMap<&String, &EdgeRecord> = bucket.iter().collect();
    Ok(serde_json::to_string_pretty(&sorted)?)
}

/// Scan a batch of namespace-relative files. Unreadable files are skipped.
fn extract_batch(backend: &LocalBackend, rels: &[String]) -> ExtractedEdges {
    let mut edges = ExtractedEdges::new();
    for rel in rels {
        match links::file_links(&backend.namespace_dir, rel, &backend.root_id) {
            Ok(targets) if !targets.is_empty() => {
                let targets = targets.iter().map(|t| backend.node_id(t)).collect();
                edges.insert(backend.node_id(rel), targets);
            }
            Ok(_) => {}
            Err(e) => debug!("Skipping {}: {}", rel, e),
        }
    }
    edges
}

#[async_trait]
impl NamespaceService for LocalBackend {
    async fn list_directory(&self, path_id: &str) -> FetchOutcome<DirectoryListing> {
        let dir = match self.fs_path(path_id) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Refusing to list {}: {}", path_id, e);
                return FetchOutcome::Empty;
            }
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return FetchOutcome::Empty;
            }
            Err(e) => return FetchOutcome::failed(format!("listing {}: {}", path_id, e)),
        };

        let mut directories = Vec::new();
        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return FetchOutcome::failed(format!("listing {}: {}", path_id, e)),
            };
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!("Skipping non UTF-8 entry in {}", dir.display());
                continue;
            };
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => directories.push(name),
                Ok(_) if self.allows(&name) => files.push(name),
                Ok(_) => {}
                Err(e) => warn!("Cannot stat {}: {}", entry.path().display(), e),
            }
        }

        directories.sort();
        files.sort();
        FetchOutcome::Ready(DirectoryListing::new(directories, files))
    }

    async fn extract_edges(&self, files: &[String]) -> FetchOutcome<ExtractedEdges> {
        let rels: Vec<String> = files
            .iter()
            .filter_map(|id| self.relative(id).ok())
            .filter(|rel| !rel.is_empty())
            .collect();
        if rels.is_empty() {
            return FetchOutcome::Empty;
        }

        let backend = self.clone();
        match tokio::task::spawn_blocking(move || extract_batch(&backend, &rels)).await {
            Ok(edges) if edges.is_empty() => FetchOutcome::Empty,
            Ok(edges) => FetchOutcome::Ready(edges),
            Err(e) => FetchOutcome::failed(format!("edge extraction task failed: {}", e)),
        }
    }

    async fn fetch_buckets(&self, bucket_ids: &BTreeSet<String>) -> FetchOutcome<BucketIndex> {
        if bucket_ids.is_empty() {
            return FetchOutcome::Empty;
        }

        let reads = bucket_ids
            .iter()
            .map(|id| async move { (id, self.read_bucket(id).await) });
        let results = futures::future::join_all(reads).await;

        let mut index = BucketIndex::new();
        let mut failures = 0;
        for (id, result) in results {
            match result {
                Ok(bucket) => index.merge_bucket(bucket),
                Err(e) => {
                    warn!("Bucket {} unreadable: {}", id, e);
                    failures += 1;
                }
            }
        }

        if failures == bucket_ids.len() {
            FetchOutcome::failed(format!("all {} buckets unreadable", failures))
        } else if index.is_empty() {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Ready(index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, LocalBackend) {
        let temp = TempDir::new().unwrap();
        let ns = temp.path().join("Notebook");
        std::fs::create_dir_all(ns.join("docs/deep")).unwrap();
        std::fs::create_dir_all(ns.join("media")).unwrap();
        std::fs::write(ns.join("index.html"), r#"<a href="docs/a.md">a</a>"#).unwrap();
        std::fs::write(ns.join("docs/a.md"), "[b](b.md) [idx](/Notebook/index.html)").unwrap();
        std::fs::write(ns.join("docs/b.md"), "no links").unwrap();
        std::fs::write(ns.join("media/clip.mp4"), "").unwrap();

        let backend = LocalBackend::new("Notebook", ns, temp.path().join("edges"))
            .with_extensions(["md", ".HTML"]);
        (temp, backend)
    }

    #[test]
    fn test_relative_rejects_escapes() {
        let (_temp, backend) = fixture();
        assert_eq!(backend.relative("Notebook").unwrap(), "");
        assert_eq!(backend.relative("Notebook/docs/a.md").unwrap(), "docs/a.md");
        assert!(backend.relative("Notebook/../etc/passwd").is_err());
        assert!(backend.relative("Notebook/docs//a.md").is_err());
        assert!(backend.relative("Other/a.md").is_err());
        assert!(backend.relative("NotebookX/a.md").is_err());
    }

    #[test]
    fn test_allows_extensions() {
        let (_temp, backend) = fixture();
        assert!(backend.allows("a.md"));
        assert!(backend.allows("A.HTML"));
        assert!(!backend.allows("clip.mp4"));
        assert!(!backend.allows("Makefile"));

        let open = LocalBackend::new("R", "/tmp", "/tmp/edges");
        assert!(open.allows("Makefile"));
    }

    #[test]
    fn test_bucket_path_uses_decoded_symbol() {
        let backend = LocalBackend::new("R", "/ns", "/edges");
        assert_eq!(backend.bucket_path("a"), PathBuf::from("/edges/a.json"));
        assert_eq!(backend.bucket_path("%C3%A9"), PathBuf::from("/edges/é.json"));
        assert_eq!(backend.bucket_path("%2F"), PathBuf::from("/edges/%2F.json"));
    }

    #[tokio::test]
    async fn test_list_directory() {
        let (_temp, backend) = fixture();

        let listing = backend.list_directory("Notebook").await.into_option().unwrap();
        assert_eq!(listing.directories, vec!["docs", "media"]);
        assert_eq!(listing.files, vec!["index.html"]);

        let media = backend.list_directory("Notebook/media").await.into_option().unwrap();
        assert!(media.is_empty());

        assert_eq!(backend.list_directory("Notebook/missing").await, FetchOutcome::Empty);
        assert_eq!(backend.list_directory("Notebook/index.html").await, FetchOutcome::Empty);
        assert_eq!(backend.list_directory("Notebook/..").await, FetchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_extract_edges() {
        let (_temp, backend) = fixture();
        let files = vec![
            "Notebook/index.html".to_string(),
            "Notebook/docs/a.md".to_string(),
            "Notebook/docs/b.md".to_string(),
            "Notebook/docs/missing.md".to_string(),
        ];

        let edges = backend.extract_edges(&files).await.into_option().unwrap();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges["Notebook/index.html"], vec!["Notebook/docs/a.md"]);
        assert_eq!(
            edges["Notebook/docs/a.md"],
            vec!["Notebook/docs/b.md", "Notebook/index.html"]
        );

        assert_eq!(backend.extract_edges(&[]).await, FetchOutcome::Empty);
        assert_eq!(
            backend.extract_edges(&["Notebook/docs/b.md".to_string()]).await,
            FetchOutcome::Empty
        );
    }

    #[tokio::test]
    async fn test_add_edge_writes_both_records() {
        let (_temp, backend) = fixture();
        backend.add_edge("Notebook/docs/a.md", "Notebook/index.html").await.unwrap();
        backend.add_edge("Notebook/docs/a.md", "Notebook/index.html").await.unwrap();
        backend.add_edge("Notebook/docs/b.md", "Notebook/index.html").await.unwrap();

        let a = backend.read_record("Notebook/docs/a.md").await.unwrap();
        assert_eq!(a.edges_from, vec!["Notebook/index.html"]);
        assert!(a.edges_to.is_empty());

        let index = backend.read_record("Notebook/index.html").await.unwrap();
        assert_eq!(index.edges_to, vec!["Notebook/docs/a.md", "Notebook/docs/b.md"]);

        assert!(backend.edges_dir().join("a.json").exists());
        assert!(backend.edges_dir().join("i.json").exists());

        assert!(backend.add_edge("Notebook/x", "Notebook/x").await.is_err());
        assert!(backend.add_edge("Notebook/../x", "Notebook/y").await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_record_replaces_and_dedups() {
        let (_temp, backend) = fixture();
        backend
            .upsert_record("Notebook/docs/a.md", vec!["Notebook/x".into()], vec![])
            .await
            .unwrap();
        let record = backend
            .upsert_record(
                "Notebook/docs/a.md",
                vec!["Notebook/y".into(), "Notebook/y".into(), "Notebook/z".into()],
                vec!["Notebook/w".into()],
            )
            .await
            .unwrap();

        assert_eq!(record.edges_from, vec!["Notebook/y", "Notebook/z"]);
        assert_eq!(backend.read_record("Notebook/docs/a.md").await.unwrap(), record);
        assert_eq!(
            backend.read_record("Notebook/never.md").await.unwrap(),
            EdgeRecord::default()
        );
    }

    #[tokio::test]
    async fn test_fetch_buckets() {
        let (_temp, backend) = fixture();
        backend.add_edge("Notebook/docs/a.md", "Notebook/docs/b.md").await.unwrap();

        let ids: BTreeSet<String> = ["a", "b", "q"].iter().map(|s| s.to_string()).collect();
        let index = backend.fetch_buckets(&ids).await.into_option().unwrap();
        assert_eq!(index.outgoing("Notebook/docs/a.md"), ["Notebook/docs/b.md"]);
        assert_eq!(index.incoming("Notebook/docs/b.md"), ["Notebook/docs/a.md"]);

        let none: BTreeSet<String> = ["q".to_string()].into_iter().collect();
        assert_eq!(backend.fetch_buckets(&none).await, FetchOutcome::Empty);
        assert_eq!(backend.fetch_buckets(&BTreeSet::new()).await, FetchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_fetch_buckets_degrades_on_corrupt_file() {
        let (_temp, backend) = fixture();
        backend.add_edge("Notebook/docs/a.md", "Notebook/docs/b.md").await.unwrap();
        std::fs::write(backend.edges_dir().join("c.json"), "{ not json").unwrap();

        let both: BTreeSet<String> = ["a", "c"].iter().map(|s| s.to_string()).collect();
        let index = backend.fetch_buckets(&both).await.into_option().unwrap();
        assert_eq!(index.len(), 1);

        let corrupt: BTreeSet<String> = ["c".to_string()].into_iter().collect();
        assert!(backend.fetch_buckets(&corrupt).await.is_failed());
    }

    #[test]
    fn test_from_config() {
        let temp = TempDir::new().unwrap();
        let config = FoldConfig::default();
        assert!(matches!(
            LocalBackend::from_config(&config, temp.path()),
            Err(BackendError::NamespaceNotFound { .. })
        ));

        std::fs::create_dir_all(temp.path().join("Notebook")).unwrap();
        let backend = LocalBackend::from_config(&config, temp.path()).unwrap();
        assert_eq!(backend.root_id(), "Notebook");
        assert_eq!(backend.edges_dir(), temp.path().join(".foldgraph/edges"));
        assert!(backend.allows("notes.txt"));
        assert!(!backend.allows("photo.png"));
    }
}
