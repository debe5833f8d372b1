//! Namespace collaborator contract.
//!
//! The engine consumes three request/response operations from the namespace
//! service. Each returns a [`FetchOutcome`] so the degradation policy is
//! visible in the types: a failure is data, not an `Err`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::bucket::BucketIndex;

/// Tagged result of one collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// The collaborator returned data
    Ready(T),
    /// The collaborator had nothing for the request
    Empty,
    /// The collaborator failed; the reason is surfaced as status text
    Failed(String),
}

impl<T> FetchOutcome<T> {
    /// Create a failed outcome
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Keep the payload, treating `Empty` and `Failed` as no data
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Empty | Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Ready(_) => "ready".to_string(),
            Self::Empty => "empty".to_string(),
            Self::Failed(reason) => format!("failed: {}", reason),
        }
    }

    /// Map the payload of a `Ready` outcome
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> FetchOutcome<U> {
        match self {
            Self::Ready(value) => FetchOutcome::Ready(f(value)),
            Self::Empty => FetchOutcome::Empty,
            Self::Failed(reason) => FetchOutcome::Failed(reason),
        }
    }
}

impl<T: Default> FetchOutcome<T> {
    /// Payload or the empty default
    pub fn unwrap_or_default(self) -> T {
        self.into_option().unwrap_or_default()
    }
}

/// One level of children below a namespace path.
///
/// Entries are local names, not full IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    #[serde(default)]
    pub directories: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl DirectoryListing {
    pub fn new(directories: Vec<String>, files: Vec<String>) -> Self {
        Self { directories, files }
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }

    /// Total entry count
    pub fn len(&self) -> usize {
        self.directories.len() + self.files.len()
    }
}

/// Live extraction result: source file ID → raw target IDs.
pub type ExtractedEdges = BTreeMap<String, Vec<String>>;

/// External namespace service consumed by the engine.
///
/// Implemented by the local filesystem and HTTP backends. Implementations
/// must never panic on bad input; every problem maps to `Empty` or `Failed`.
#[async_trait]
pub trait NamespaceService: Send + Sync {
    /// List the direct children of a namespace path.
    ///
    /// A path that does not exist yields `Empty`.
    async fn list_directory(&self, path_id: &str) -> FetchOutcome<DirectoryListing>;

    /// Scan file contents for outgoing references.
    ///
    /// Empty input yields `Empty` without contacting anything.
    async fn extract_edges(&self, files: &[String]) -> FetchOutcome<ExtractedEdges>;

    /// Fetch and merge pre-computed edge buckets.
    ///
    /// Buckets that are missing or fail contribute nothing.
    async fn fetch_buckets(&self, bucket_ids: &BTreeSet<String>) -> FetchOutcome<BucketIndex>;
}

// Compile-time check that NamespaceService is object-safe
#[allow(dead_code)]
fn _assert_object_safe(_: &dyn NamespaceService) {}
