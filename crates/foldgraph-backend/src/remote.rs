//! Remote backend for a namespace served over HTTP.
//!
//! Endpoints (relative to the server URL):
//!
//! | Operation        | Request                                   | Response                      |
//! |------------------|-------------------------------------------|-------------------------------|
//! | list directory   | `GET /api/listDirectory?path={id}`        | `{directories, files}`        |
//! | extract edges    | `POST /api/extractEdgesBatch {files}`     | `{edgeMap: {rel: [rel]}}`     |
//! | fetch bucket     | `GET /api/readEdgeBucket?file={sym}.json` | `{id: {edgesFrom, edgesTo}}`  |
//! | read record      | `GET /api/edges?id={id}`                  | `{id, edgesFrom, edgesTo}`    |
//!
//! Extraction speaks namespace-relative paths; this client converts to and
//! from node IDs.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use foldgraph_config::RemoteConfig;
use foldgraph_core::bucket::{Bucket, BucketIndex, EdgeRecord};
use foldgraph_core::namespace;
use foldgraph_core::source::{DirectoryListing, ExtractedEdges, FetchOutcome, NamespaceService};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BackendError;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct ExtractRequest<'a> {
    files: &'a [String],
}

#[derive(Deserialize, Default)]
struct ExtractResponse {
    #[serde(rename = "edgeMap", default)]
    edge_map: BTreeMap<String, Vec<String>>,
}

/// Remote backend for connecting to a namespace server over HTTP.
pub struct RemoteBackend {
    client: Client,
    server_url: String,
    root_id: String,
}

impl RemoteBackend {
    /// Create a new remote backend.
    ///
    /// # Arguments
    /// * `server_url` - Namespace server URL (e.g., "http://localhost:3000")
    /// * `root_id` - ID of the namespace root node
    pub fn new(
        server_url: impl Into<String>,
        root_id: impl Into<String>,
    ) -> Result<Self, BackendError> {
        Self::with_timeout(server_url, root_id, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a remote backend with a custom request timeout.
    pub fn with_timeout(
        server_url: impl Into<String>,
        root_id: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BackendError::connection(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            server_url: server_url.into().trim_end_matches('/').to_string(),
            root_id: root_id.into(),
        })
    }

    /// Create a remote backend from configuration.
    pub fn from_config(
        config: &RemoteConfig,
        root_id: impl Into<String>,
    ) -> Result<Self, BackendError> {
        Self::with_timeout(&config.url, root_id, config.timeout_secs)
    }

    /// Get the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.server_url, path)
    }

    fn node_id(&self, rel: &str) -> String {
        namespace::child_id(&self.root_id, rel.trim_start_matches('/'))
    }

    /// Read the stored record of one node.
    pub async fn read_record(&self, id: &str) -> Result<EdgeRecord, BackendError> {
        let response = self
            .client
            .get(self.endpoint("edges"))
            .query(&[("id", id)])
            .send()
            .await
            .map_err(request_error)?;

        match response.status() {
            StatusCode::OK => response
                .json::<EdgeRecord>()
                .await
                .map_err(|e| BackendError::with_context("decoding edge record", e.to_string())),
            StatusCode::NOT_FOUND => Ok(EdgeRecord::default()),
            status => Err(server_error(status, response).await),
        }
    }

    async fn fetch_bucket(&self, bucket_id: &str) -> Result<Bucket, BackendError> {
        let symbol = urlencoding::decode(bucket_id)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| bucket_id.to_string());

        let response = self
            .client
            .get(self.endpoint("readEdgeBucket"))
            .query(&[("file", format!("{}.json", symbol))])
            .send()
            .await
            .map_err(request_error)?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| {
                    BackendError::with_context(format!("decoding bucket {}", bucket_id), e.to_string())
                }),
            StatusCode::NOT_FOUND => Ok(Bucket::new()),
            status => Err(server_error(status, response).await),
        }
    }
}

fn request_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::connection("request timed out")
    } else if e.is_connect() {
        BackendError::connection(format!("cannot reach server: {}", e))
    } else {
        BackendError::connection(e.to_string())
    }
}

async fn server_error(status: StatusCode, response: reqwest::Response) -> BackendError {
    let message = response.text().await.unwrap_or_default();
    BackendError::remote_server(status.as_u16(), message)
}

#[async_trait]
impl NamespaceService for RemoteBackend {
    async fn list_directory(&self, path_id: &str) -> FetchOutcome<DirectoryListing> {
        let response = match self
            .client
            .get(self.endpoint("listDirectory"))
            .query(&[("path", path_id)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchOutcome::failed(request_error(e).to_string()),
        };

        match response.status() {
            StatusCode::OK => match response.json::<DirectoryListing>().await {
                Ok(listing) => FetchOutcome::Ready(listing),
                Err(e) => FetchOutcome::failed(format!("invalid listing for {}: {}", path_id, e)),
            },
            StatusCode::NOT_FOUND => FetchOutcome::Empty,
            status => FetchOutcome::failed(server_error(status, response).await.to_string()),
        }
    }

    async fn extract_edges(&self, files: &[String]) -> FetchOutcome<ExtractedEdges> {
        if files.is_empty() {
            return FetchOutcome::Empty;
        }

        let relative: Vec<String> = files
            .iter()
            .map(|id| namespace::relative_path(id, &self.root_id).to_string())
            .collect();
        debug!("Extracting edges from {} files", relative.len());

        let response = match self
            .client
            .post(self.endpoint("extractEdgesBatch"))
            .json(&ExtractRequest { files: &relative })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchOutcome::failed(request_error(e).to_string()),
        };

        let body = match response.status() {
            StatusCode::OK => match response.json::<ExtractResponse>().await {
                Ok(body) => body,
                Err(e) => return FetchOutcome::failed(format!("invalid edge map: {}", e)),
            },
            status => return FetchOutcome::failed(server_error(status, response).await.to_string()),
        };

        let edges: ExtractedEdges = body
            .edge_map
            .into_iter()
            .filter(|(_, targets)| !targets.is_empty())
            .map(|(source, targets)| {
                let targets = targets.iter().map(|t| self.node_id(t)).collect();
                (self.node_id(&source), targets)
            })
            .collect();

        if edges.is_empty() {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Ready(edges)
        }
    }

    async fn fetch_buckets(&self, bucket_ids: &BTreeSet<String>) -> FetchOutcome<BucketIndex> {
        if bucket_ids.is_empty() {
            return FetchOutcome::Empty;
        }

        let fetches = bucket_ids
            .iter()
            .map(|id| async move { (id, self.fetch_bucket(id).await) });
        let results = futures::future::join_all(fetches).await;

        let mut index = BucketIndex::new();
        let mut failures = 0;
        let mut last_error = String::new();
        for (id, result) in results {
            match result {
                Ok(bucket) => index.merge_bucket(bucket),
                Err(e) => {
                    warn!("Bucket fetch failed: {} ({})", id, e);
                    failures += 1;
                    last_error = e.to_string();
                }
            }
        }

        if failures == bucket_ids.len() {
            FetchOutcome::failed(format!("all {} bucket fetches failed: {}", failures, last_error))
        } else if index.is_empty() {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Ready(index)
        }
    }
}
