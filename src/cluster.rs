use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::{BenchError, Result};

/// Kind of search cluster being benchmarked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterKind {
    Elasticsearch,
    OpenSearch,
}

impl ClusterKind {
    /// Human-readable label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            ClusterKind::Elasticsearch => "Elasticsearch",
            ClusterKind::OpenSearch => "OpenSearch",
        }
    }
}

impl std::fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterKind::Elasticsearch => write!(f, "elasticsearch"),
            ClusterKind::OpenSearch => write!(f, "opensearch"),
        }
    }
}

impl std::str::FromStr for ClusterKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elasticsearch" | "es" => Ok(ClusterKind::Elasticsearch),
            "opensearch" | "os" => Ok(ClusterKind::OpenSearch),
            _ => Err(format!("Unknown cluster kind: {}", s)),
        }
    }
}

/// Connection settings for one cluster
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub kind: ClusterKind,
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Reject invalid TLS certificates when true
    pub verify_tls: bool,
    pub timeout_secs: u64,
}

/// A search cluster the benchmark can talk to.
///
/// Implemented over HTTP by [`ClusterClient`]; tests provide in-process doubles.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Endpoint this backend is connected to
    fn endpoint(&self) -> &str;

    /// Check that the cluster is reachable
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Run a search against an index and return the raw response document
    async fn search(&self, index: &str, body: &Value) -> Result<Value>;
}

/// HTTP client for an Elasticsearch or OpenSearch cluster
pub struct ClusterClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Base URL without a trailing slash
    endpoint: String,

    /// Basic auth credentials
    credentials: Option<(String, Option<String>)>,
}

impl ClusterClient {
    /// Create a new cluster client
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(BenchError::Config(format!(
                "{} endpoint is empty",
                config.kind.label()
            )));
        }
        if config.timeout_secs == 0 {
            return Err(BenchError::Config(format!(
                "{} request timeout must be at least 1 second",
                config.kind.label()
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .gzip(true)
            .build()?;

        let credentials = config
            .username
            .clone()
            .map(|user| (user, config.password.clone()));

        Ok(Self {
            client,
            endpoint,
            credentials,
        })
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, password.as_ref()),
            None => request,
        }
    }
}

#[async_trait]
impl SearchBackend for ClusterClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn ping(&self) -> Result<()> {
        tracing::debug!(endpoint = %self.endpoint, "Checking cluster connectivity");

        let connection_error = |message: String| BenchError::Connection {
            endpoint: self.endpoint.clone(),
            message,
        };

        let response = self
            .with_auth(self.client.get(format!("{}/", self.endpoint)))
            .send()
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(connection_error(format!("cluster returned {}", status)));
        }

        let info: Value = response
            .json()
            .await
            .map_err(|e| connection_error(e.to_string()))?;
        tracing::info!(
            endpoint = %self.endpoint,
            cluster_name = info["cluster_name"].as_str().unwrap_or("unknown"),
            version = info["version"]["number"].as_str().unwrap_or("unknown"),
            "Connected to cluster"
        );

        Ok(())
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{}/_search", self.endpoint, index);

        let response = self
            .with_auth(self.client.post(&url))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::debug!(status = %status, url = %url, "Search returned error status");
            return Err(BenchError::Search {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
