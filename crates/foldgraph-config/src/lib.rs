//! FoldGraph Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.foldgraph/config.toml`
//! - Local config: `.foldgraph/config.toml` (in workspace)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration for FoldGraph.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FoldConfig {
    /// Namespace being visualized
    pub namespace: NamespaceConfig,

    /// Pre-computed edge buckets
    pub buckets: BucketConfig,

    /// Backend configuration
    pub backend: BackendConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// The namespace root and which files it exposes.
///
/// # Example TOML
///
/// ```toml
/// [namespace]
/// root_id = "Notebook"
/// root_dir = "Notebook"
/// file_extensions = ["md", "html"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NamespaceConfig {
    /// ID of the root node; every node ID starts with it
    pub root_id: String,

    /// Directory holding the namespace (relative to the workspace)
    pub root_dir: PathBuf,

    /// File extensions listed by the local backend (empty = all files)
    pub file_extensions: Vec<String>,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            root_id: "Notebook".to_string(),
            root_dir: PathBuf::from("Notebook"),
            file_extensions: ["md", "html", "txt", "json", "js", "css"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Bucket storage and caching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BucketConfig {
    /// Directory holding `{bucket}.json` files (relative to the workspace)
    pub edges_dir: PathBuf,

    /// LRU bucket cache capacity; 0 disables the cache
    pub cache_capacity: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            edges_dir: PathBuf::from(".foldgraph/edges"),
            cache_capacity: 0,
        }
    }
}

/// Backend configuration for namespace operations.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend type to use
    pub backend_type: BackendType,

    /// Remote server configuration (for HTTP backend)
    pub remote: Option<RemoteConfig>,
}

/// Backend type selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Local backend reading the namespace from disk
    #[default]
    Local,
    /// Remote HTTP backend
    Remote,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" | "http" => Ok(Self::Remote),
            _ => Err(ConfigError::invalid_value(
                "backend.backend_type",
                format!("unknown backend '{}'. Valid values: local, remote", s),
            )),
        }
    }
}

/// Remote namespace server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Remote server URL
    pub url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override namespace root ID
    pub root_id: Option<String>,

    /// Override namespace directory
    pub root_dir: Option<PathBuf>,

    /// Override backend type
    pub backend_type: Option<BackendType>,

    /// Override remote URL (implies the remote backend)
    pub remote_url: Option<String>,

    /// Override bucket cache capacity
    pub cache_capacity: Option<usize>,

    /// Override log level
    pub log_level: Option<String>,
}

impl FoldConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref root_id) = overrides.root_id {
            self.namespace.root_id = root_id.clone();
        }

        if let Some(ref dir) = overrides.root_dir {
            self.namespace.root_dir = dir.clone();
        }

        if let Some(backend_type) = overrides.backend_type {
            self.backend.backend_type = backend_type;
        }

        if let Some(ref url) = overrides.remote_url {
            self.backend.backend_type = BackendType::Remote;
            let remote = self.backend.remote.get_or_insert_with(RemoteConfig::default);
            remote.url = url.clone();
        }

        if let Some(capacity) = overrides.cache_capacity {
            self.buckets.cache_capacity = capacity;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let root_id = &self.namespace.root_id;
        if root_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "namespace.root_id must not be empty".to_string(),
            ));
        }
        if root_id.contains('/') {
            return Err(ConfigError::invalid_value(
                "namespace.root_id",
                format!("'{}' must be a single path segment", root_id),
            ));
        }
        if self.backend.backend_type == BackendType::Remote && self.backend.remote.is_none() {
            return Err(ConfigError::ValidationError(
                "backend.backend_type is 'remote' but [backend.remote] section is missing"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Get the effective namespace directory for a workspace.
    pub fn namespace_dir(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.namespace.root_dir)
    }

    /// Get the effective bucket directory for a workspace.
    pub fn edges_dir(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.buckets.edges_dir)
    }
}

fn resolve(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}
