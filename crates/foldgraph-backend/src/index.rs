//! Bucket index builder.
//!
//! Walks the namespace directory, scans every scannable file for links and
//! writes the resulting records into bucket files. Each discovered link
//! `A → B` lands in both records: `A.edgesFrom` and `B.edgesTo`.

use std::io::ErrorKind;
use std::path::Path;

use foldgraph_core::bucket::{Bucket, BucketIndex, EdgeRecord};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::BackendError;
use crate::links::{self, ContentKind};
use crate::local::{bucket_json, LocalBackend};

/// Counters reported by a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files_scanned: usize,
    pub links_found: usize,
    /// Nodes with a record after the build
    pub records_written: usize,
    pub buckets_written: usize,
    /// Bucket files deleted by a clean build
    pub buckets_removed: usize,
}

/// Builds bucket files for a [`LocalBackend`].
pub struct BucketIndexBuilder<'a> {
    backend: &'a LocalBackend,
    clean: bool,
}

impl<'a> BucketIndexBuilder<'a> {
    pub fn new(backend: &'a LocalBackend) -> Self {
        Self {
            backend,
            clean: false,
        }
    }

    /// Delete existing bucket files before writing.
    ///
    /// Without it, scanned records are merged into existing buckets so
    /// manually added links survive a rebuild.
    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn build(&self) -> Result<IndexStats, BackendError> {
        self.build_with_progress(|_| {})
    }

    /// Build, calling `on_file` with each namespace-relative path scanned.
    pub fn build_with_progress<F>(&self, mut on_file: F) -> Result<IndexStats, BackendError>
    where
        F: FnMut(&str),
    {
        let namespace_dir = self.backend.namespace_dir();
        if !namespace_dir.is_dir() {
            return Err(BackendError::namespace_not_found(namespace_dir));
        }

        let mut stats = IndexStats::default();
        let mut index = BucketIndex::new();

        for rel in self.scannable_files(namespace_dir) {
            on_file(&rel);
            stats.files_scanned += 1;

            let targets =
                match links::file_links(namespace_dir, &rel, self.backend.root_id()) {
                    Ok(targets) => targets,
                    Err(e) => {
                        warn!("Cannot scan {}: {}", rel, e);
                        continue;
                    }
                };
            if targets.is_empty() {
                continue;
            }

            stats.links_found += targets.len();
            let source = self.backend.node_id(&rel);
            let target_ids: Vec<String> = targets.iter().map(|t| self.backend.node_id(t)).collect();
            for target in &target_ids {
                index.insert(
                    target.clone(),
                    EdgeRecord::new(Vec::new(), vec![source.clone()]),
                );
            }
            index.insert(source, EdgeRecord::new(target_ids, Vec::new()));
        }

        if self.clean {
            stats.buckets_removed = self.remove_bucket_files()?;
        }

        for (bucket_id, fresh) in index.into_buckets() {
            let path = self.backend.bucket_path(&bucket_id);
            let mut bucket = if self.clean {
                Bucket::new()
            } else {
                read_existing(&path)
            };
            for (id, record) in fresh {
                bucket.entry(id).or_default().absorb(record);
            }

            stats.records_written += bucket.len();
            write_file(&path, &bucket)?;
            stats.buckets_written += 1;
            debug!("Wrote bucket {} ({} records)", bucket_id, bucket.len());
        }

        info!(
            "Indexed {} files: {} links into {} buckets",
            stats.files_scanned, stats.links_found, stats.buckets_written
        );
        Ok(stats)
    }

    /// Namespace-relative paths of scannable files, sorted.
    fn scannable_files(&self, namespace_dir: &Path) -> Vec<String> {
        let mut files = Vec::new();
        for entry in WalkDir::new(namespace_dir)
            .into_iter()
            .filter_entry(|e| {
                if !e.file_type().is_dir() || e.depth() == 0 {
                    return true;
                }
                !e.file_name().to_string_lossy().starts_with('.')
            })
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error walking directory: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(namespace_dir) else {
                continue;
            };
            let Some(rel) = relative
                .components()
                .map(|c| c.as_os_str().to_str())
                .collect::<Option<Vec<_>>>()
                .map(|parts| parts.join("/"))
            else {
                warn!("Skipping non UTF-8 path {}", entry.path().display());
                continue;
            };

            let name = entry.file_name().to_string_lossy();
            if self.backend.allows(&name) && ContentKind::from_path(&rel).is_some() {
                files.push(rel);
            }
        }
        files.sort();
        files
    }

    fn remove_bucket_files(&self) -> Result<usize, BackendError> {
        let entries = match std::fs::read_dir(self.backend.edges_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn read_existing(path: &Path) -> Bucket {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Replacing unreadable bucket {}: {}", path.display(), e);
            Bucket::new()
        }),
        Err(_) => Bucket::new(),
    }
}

fn write_file(path: &Path, bucket: &Bucket) -> Result<(), BackendError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bucket_json(bucket)?).map_err(|e| {
        BackendError::with_context(format!("writing {}", path.display()), e.to_string())
    })
}
