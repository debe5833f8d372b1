//! Layered configuration loading.
//!
//! defaults → `~/.foldgraph/config.toml` → `<workspace>/.foldgraph/config.toml`
//! (or the file given with `--config`) → CLI overrides. Later layers win,
//! field by field.

use crate::error::ConfigError;
use crate::{
    BackendConfig, BucketConfig, ConfigOverrides, FoldConfig, LoggingConfig, NamespaceConfig,
    RemoteConfig,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory holding the config file, both under `$HOME` and in a workspace.
const CONFIG_DIR: &str = ".foldgraph";

/// Resolves config file locations and merges the layers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// `~/.foldgraph`, when a home directory exists
    global_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_dir: dirs::home_dir().map(|home| home.join(CONFIG_DIR)),
        }
    }

    /// Loader with a fixed global directory instead of `~/.foldgraph`.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_dir: Some(global_dir.into()),
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_dir.as_ref().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Defaults, then the global file, then the workspace file, then `overrides`.
    ///
    /// Either file may be absent.
    pub fn load(
        &self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<FoldConfig, ConfigError> {
        let local = self.local_config_path(workspace_root);
        let local = optional_file(&local)?;
        self.layered(local, overrides)
    }

    /// Like [`load`](Self::load), with `config_file` in place of the workspace
    /// file. The explicit file must exist.
    pub fn load_from_file(
        &self,
        config_file: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<FoldConfig, ConfigError> {
        debug!("Loading explicit config from {:?}", config_file);
        let explicit = load_config_file(config_file)?;
        self.layered(Some(explicit), overrides)
    }

    fn layered(
        &self,
        top: Option<FoldConfig>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<FoldConfig, ConfigError> {
        let global = match self.global_config_path() {
            Some(path) => optional_file(&path)?,
            None => {
                debug!("No home directory found, skipping global config");
                None
            }
        };

        let mut config = [global, top]
            .into_iter()
            .flatten()
            .fold(FoldConfig::default(), merge_configs);
        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }
        Ok(config)
    }

    /// Write a default `~/.foldgraph/config.toml` unless one exists.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let dir = self.global_dir.as_deref().ok_or(ConfigError::NoHomeDir)?;
        init_in(dir)
    }

    /// Write a default `<workspace>/.foldgraph/config.toml` unless one exists.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        init_in(&workspace_root.join(CONFIG_DIR))
    }
}

fn optional_file(path: &Path) -> Result<Option<FoldConfig>, ConfigError> {
    if !path.exists() {
        trace!("No config at {:?}", path);
        return Ok(None);
    }
    debug!("Loading config from {:?}", path);
    load_config_file(path).map(Some)
}

fn load_config_file(path: &Path) -> Result<FoldConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

fn init_in(dir: &Path) -> Result<PathBuf, ConfigError> {
    std::fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        let content = toml::to_string_pretty(&FoldConfig::default())?;
        std::fs::write(&path, content).map_err(|e| ConfigError::write_file(&path, e))?;
    }
    Ok(path)
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// This performs a field-by-field merge, allowing partial configs. A field
/// still at its default value in `overlay` does not override `base`.
fn merge_configs(base: FoldConfig, overlay: FoldConfig) -> FoldConfig {
    FoldConfig {
        namespace: merge_namespace(base.namespace, overlay.namespace),
        buckets: merge_buckets(base.buckets, overlay.buckets),
        backend: merge_backend(base.backend, overlay.backend),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge namespace config.
fn merge_namespace(base: NamespaceConfig, overlay: NamespaceConfig) -> NamespaceConfig {
    let default = NamespaceConfig::default();
    NamespaceConfig {
        root_id: pick(base.root_id, overlay.root_id, default.root_id),
        root_dir: pick(base.root_dir, overlay.root_dir, default.root_dir),
        // Extension lists replace rather than extend: narrowing must be possible
        file_extensions: pick(
            base.file_extensions,
            overlay.file_extensions,
            default.file_extensions,
        ),
    }
}

/// Merge bucket config.
fn merge_buckets(base: BucketConfig, overlay: BucketConfig) -> BucketConfig {
    let default = BucketConfig::default();
    BucketConfig {
        edges_dir: pick(base.edges_dir, overlay.edges_dir, default.edges_dir),
        cache_capacity: pick(
            base.cache_capacity,
            overlay.cache_capacity,
            default.cache_capacity,
        ),
    }
}

/// Merge backend config.
fn merge_backend(base: BackendConfig, overlay: BackendConfig) -> BackendConfig {
    BackendConfig {
        backend_type: pick(base.backend_type, overlay.backend_type, Default::default()),
        remote: match (base.remote, overlay.remote) {
            (Some(base), Some(overlay)) => Some(merge_remote(base, overlay)),
            (base, overlay) => overlay.or(base),
        },
    }
}

/// Merge remote server config.
fn merge_remote(base: RemoteConfig, overlay: RemoteConfig) -> RemoteConfig {
    let default = RemoteConfig::default();
    RemoteConfig {
        url: pick(base.url, overlay.url, default.url),
        timeout_secs: pick(base.timeout_secs, overlay.timeout_secs, default.timeout_secs),
    }
}

/// Merge logging config.
fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let default = LoggingConfig::default();
    LoggingConfig {
        level: pick(base.level, overlay.level, default.level),
        format: pick(base.format, overlay.format, default.format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendType, LogFormat};
    use tempfile::TempDir;

    fn create_test_config(content: &str, dir: &Path, filename: &str) -> PathBuf {
        let config_dir = dir.join(".foldgraph");
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join(filename);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn write_global(dir: &Path, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("config.toml"), content).unwrap();
    }

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config, FoldConfig::default());
    }

    #[test]
    fn test_load_local_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        create_test_config(
            r#"
            [namespace]
            root_id = "Vault"
            root_dir = "notes"

            [buckets]
            cache_capacity = 32
            "#,
            temp.path(),
            "config.toml",
        );

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.namespace.root_id, "Vault");
        assert_eq!(config.namespace.root_dir, PathBuf::from("notes"));
        assert_eq!(config.buckets.cache_capacity, 32);
    }

    #[test]
    fn test_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        write_global(
            &global_dir,
            r#"
            [logging]
            level = "debug"

            [backend.remote]
            url = "http://global:3000"
            timeout_secs = 5
            "#,
        );

        create_test_config(
            r#"
            [backend.remote]
            url = "http://local:3000"
            "#,
            temp.path(),
            "config.toml",
        );

        let loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        let remote = config.backend.remote.unwrap();
        assert_eq!(remote.url, "http://local:3000");
        // Global value preserved where local is silent
        assert_eq!(remote.timeout_secs, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_all() {
        let temp = TempDir::new().unwrap();

        create_test_config(
            r#"
            [namespace]
            root_id = "Local"

            [logging]
            format = "json"
            "#,
            temp.path(),
            "config.toml",
        );

        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let overrides = ConfigOverrides {
            root_id: Some("Cli".to_string()),
            log_level: Some("trace".to_string()),
            ..Default::default()
        };

        let config = loader.load(temp.path(), Some(&overrides)).unwrap();

        assert_eq!(config.namespace.root_id, "Cli");
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config("[namespace\nroot_id =", temp.path(), "config.toml");

        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let err = loader.load(temp.path(), None).unwrap_err();

        assert!(matches!(err, ConfigError::ParseToml { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let temp = TempDir::new().unwrap();
        let explicit = temp.path().join("custom.toml");
        std::fs::write(&explicit, "[buckets]\nedges_dir = \"idx\"\n").unwrap();
        create_test_config("[buckets]\nedges_dir = \"ignored\"\n", temp.path(), "config.toml");

        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let config = loader.load_from_file(&explicit, None).unwrap();

        assert_eq!(config.buckets.edges_dir, PathBuf::from("idx"));
    }

    #[test]
    fn test_initialized_file_round_trips() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let path = loader.init_local(temp.path()).unwrap();
        let edited = std::fs::read_to_string(&path)
            .unwrap()
            .replace("backend_type = \"local\"", "backend_type = \"remote\"");
        std::fs::write(&path, edited).unwrap();

        let loaded = loader.load(temp.path(), None).unwrap();
        assert_eq!(loaded.backend.backend_type, BackendType::Remote);
        assert_eq!(loaded.namespace, NamespaceConfig::default());
    }

    #[test]
    fn test_init_local_creates_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config_path = loader.init_local(temp.path()).unwrap();

        assert!(config_path.exists());
        assert!(config_path.ends_with(".foldgraph/config.toml"));

        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: FoldConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, FoldConfig::default());
    }

    #[test]
    fn test_init_local_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config("[logging]\nlevel = \"error\"\n", temp.path(), "config.toml");
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        loader.init_local(temp.path()).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("error"));
    }

    #[test]
    fn test_extension_list_replaces() {
        let base = NamespaceConfig::default();
        let overlay = NamespaceConfig {
            file_extensions: vec!["md".to_string()],
            ..Default::default()
        };

        let merged = merge_namespace(base, overlay);
        assert_eq!(merged.file_extensions, vec!["md".to_string()]);
    }

    #[test]
    fn test_init_global_uses_global_dir() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        let loader = ConfigLoader::with_global_dir(&global_dir);

        let path = loader.init_global().unwrap();
        assert_eq!(path, global_dir.join("config.toml"));
        assert_eq!(loader.global_config_path(), Some(path));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let err = loader
            .load_from_file(&temp.path().join("missing.toml"), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
