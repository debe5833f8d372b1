//! CLI command implementations

pub mod config;
pub mod edges;
pub mod index;
pub mod link;
pub mod view;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use foldgraph_backend::LocalBackend;
use foldgraph_config::{BackendType, ConfigLoader, FoldConfig};

use crate::GlobalOptions;

/// Resolve the workspace path from options or current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    if let Some(ref ws) = global.workspace {
        if !ws.is_dir() {
            anyhow::bail!("Workspace '{}' is not a directory", ws.display());
        }
        return ws
            .canonicalize()
            .with_context(|| format!("Failed to resolve workspace {}", ws.display()));
    }

    std::env::current_dir().context("Failed to get current directory")
}

/// Load configuration, honoring `--config` and the CLI overrides.
pub fn load_config(global: &GlobalOptions, workspace: &Path) -> Result<FoldConfig> {
    let loader = ConfigLoader::new();
    let overrides = global.to_config_overrides();

    let config = match global.config {
        Some(ref config_path) => loader
            .load_from_file(config_path, Some(&overrides))
            .with_context(|| format!("Failed to load config file {}", config_path.display()))?,
        None => loader
            .load(workspace, Some(&overrides))
            .context("Failed to load configuration")?,
    };

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Workspace and merged configuration in one step.
pub fn workspace_and_config(global: &GlobalOptions) -> Result<(PathBuf, FoldConfig)> {
    let workspace = resolve_workspace(global)?;
    let config = load_config(global, &workspace)?;
    Ok((workspace, config))
}

/// Create the local backend, refusing remote configurations.
///
/// Bucket writes only exist for namespaces on disk.
pub fn local_backend(config: &FoldConfig, workspace: &Path, action: &str) -> Result<LocalBackend> {
    if config.backend.backend_type == BackendType::Remote {
        anyhow::bail!("'{}' needs the local backend; the remote server owns its buckets", action);
    }
    LocalBackend::from_config(config, workspace).context("Failed to create local backend")
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
