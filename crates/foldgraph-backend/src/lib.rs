//! FoldGraph Backend - Namespace services for the graph engine
//!
//! This crate provides the [`NamespaceService`] implementations the engine
//! talks to:
//!
//! - [`LocalBackend`]: Serves a namespace directory and bucket files from disk
//! - [`RemoteBackend`]: HTTP client for a namespace server
//!
//! plus the [`BucketIndexBuilder`] that pre-computes bucket files from a
//! local namespace, and the [`links`] scanner both of them share.
//!
//! ## Example
//!
//! ```ignore
//! use foldgraph_backend::create_service;
//! use foldgraph_config::FoldConfig;
//! use foldgraph_core::{GraphEngine, GraphStore};
//! use parking_lot::RwLock;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FoldConfig::default();
//!     let service = create_service(&config, "/path/to/workspace")?;
//!     let engine = GraphEngine::new(Arc::new(RwLock::new(GraphStore::new())), service);
//!     engine.load_root(&config.namespace.root_id).await?;
//!     println!("{}", engine.status());
//!     Ok(())
//! }
//! ```

mod error;
mod index;
pub mod links;
mod local;
mod remote;

pub use error::BackendError;
pub use index::{BucketIndexBuilder, IndexStats};
pub use local::LocalBackend;
pub use remote::RemoteBackend;

use std::path::Path;
use std::sync::Arc;

use foldgraph_config::{BackendType, FoldConfig};
use foldgraph_core::{CachedBuckets, NamespaceService};
use tracing::debug;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Build the namespace service selected by the configuration.
///
/// Wraps the service in a bucket cache when `buckets.cache_capacity > 0`.
pub fn create_service(
    config: &FoldConfig,
    workspace_root: impl AsRef<Path>,
) -> Result<Arc<dyn NamespaceService>> {
    config.validate()?;
    let capacity = config.buckets.cache_capacity;

    match config.backend.backend_type {
        BackendType::Local => {
            let backend = LocalBackend::from_config(config, workspace_root)?;
            Ok(with_cache(backend, capacity))
        }
        BackendType::Remote => {
            let remote = config.backend.remote.as_ref().ok_or_else(|| {
                BackendError::with_context("remote backend", "missing [backend.remote] section")
            })?;
            let backend = RemoteBackend::from_config(remote, &config.namespace.root_id)?;
            Ok(with_cache(backend, capacity))
        }
    }
}

fn with_cache<S>(service: S, capacity: usize) -> Arc<dyn NamespaceService>
where
    S: NamespaceService + 'static,
{
    if capacity == 0 {
        Arc::new(service)
    } else {
        debug!("Bucket cache enabled (capacity {})", capacity);
        Arc::new(CachedBuckets::new(service, capacity))
    }
}
