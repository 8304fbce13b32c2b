//! Mock search cluster answering the subset of the REST API the benchmark uses.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use super::config::MockClusterConfig;

/// Mock search cluster for standalone runs and tests
pub struct MockSearchCluster {
    config: MockClusterConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl MockSearchCluster {
    /// Create a new mock cluster with the given configuration
    pub fn new(config: MockClusterConfig) -> Self {
        Self {
            config,
            shutdown_tx: None,
            port: 0,
        }
    }

    /// Start the mock cluster and return the actual port
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("127.0.0.1:{}", self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        self.port = port;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = router(self.config.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give the server a moment to start
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        tracing::info!(port, index = %self.config.index_name, "Mock search cluster started");
        Ok(port)
    }

    /// Get the cluster's port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the cluster's URL
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Stop the mock cluster
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockSearchCluster {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build the mock cluster's router
pub fn router(config: MockClusterConfig) -> Router {
    Router::new()
        .route("/", get(handle_info))
        .route("/:index/_search", post(handle_search))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(config))
}

/// Cluster info, as returned by `GET /`
async fn handle_info() -> Json<Value> {
    Json(json!({
        "name": "mock-node-1",
        "cluster_name": "search-bench-mock",
        "version": {
            "distribution": "mock",
            "number": env!("CARGO_PKG_VERSION")
        },
        "tagline": "You Know, for Search"
    }))
}

/// Handle `POST /{index}/_search`
async fn handle_search(
    State(config): State<Arc<MockClusterConfig>>,
    Path(index): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if index != config.index_name {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {
                    "type": "index_not_found_exception",
                    "reason": format!("no such index [{}]", index)
                },
                "status": 404
            })),
        )
            .into_response();
    }

    // Decided before any await; the thread-local RNG is not Send.
    let fail = config.error_rate > 0.0 && rand::thread_rng().gen::<f64>() < config.error_rate;

    if config.latency_ms > 0 {
        tokio::time::sleep(tokio::time::Duration::from_millis(config.latency_ms)).await;
    }

    if fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Simulated error").into_response();
    }

    let mut response = json!({
        "took": config.latency_ms,
        "timed_out": false,
        "hits": {
            "total": {"value": config.hit_count, "relation": "eq"},
            "hits": []
        }
    });

    if let Some(aggs) = body.get("aggs").and_then(Value::as_object) {
        let aggregations: serde_json::Map<String, Value> = aggs
            .keys()
            .map(|name| (name.clone(), json!({"buckets": []})))
            .collect();
        response["aggregations"] = Value::Object(aggregations);
    }

    Json(response).into_response()
}
