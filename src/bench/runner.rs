//! Benchmark runner: fans the query set out over concurrent workers.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::config::BenchmarkConfig;
use super::metrics::compute_statistics;
use super::query::{run_query, QueryDefinition, QueryResult};
use super::report::BenchmarkRun;
use crate::cluster::SearchBackend;
use crate::error::{BenchError, Result};

/// Benchmark runner that drives `num_clients` workers against one cluster
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    queries: Arc<[QueryDefinition]>,
}

impl BenchmarkRunner {
    /// Create a new benchmark runner, rejecting invalid configurations
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        config.validate()?;
        let queries = Arc::from(config.queries.clone());
        Ok(Self { config, queries })
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run the benchmark against a cluster and reduce the results.
    ///
    /// The cluster must answer a ping before any worker starts. Individual
    /// query failures are recorded, never fatal.
    pub async fn run(&self, cluster: &str, backend: Arc<dyn SearchBackend>) -> Result<BenchmarkRun> {
        backend.ping().await?;

        tracing::info!(
            cluster = %cluster,
            endpoint = %backend.endpoint(),
            index = %self.config.index_name,
            num_clients = self.config.num_clients,
            duration_secs = self.config.test_duration.as_secs_f64(),
            queries = self.queries.len(),
            "Starting benchmark"
        );

        let timestamp = chrono::Utc::now();
        let results = self.run_workers(backend.clone()).await?;
        let stats = compute_statistics(&results, self.config.test_duration);

        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(
            cluster = %cluster,
            total = results.len(),
            failed,
            "Benchmark finished"
        );

        Ok(BenchmarkRun {
            timestamp,
            cluster: cluster.to_string(),
            test_duration: self.config.test_duration.as_secs_f64(),
            num_clients: self.config.num_clients,
            index_name: self.config.index_name.clone(),
            endpoint: backend.endpoint().to_string(),
            stats,
            raw_results: results,
        })
    }

    /// Spawn the workers, wait for all of them and concatenate their results
    async fn run_workers(&self, backend: Arc<dyn SearchBackend>) -> Result<Vec<QueryResult>> {
        let index: Arc<str> = Arc::from(self.config.index_name.as_str());

        let handles: Vec<_> = (0..self.config.num_clients)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    backend.clone(),
                    index.clone(),
                    self.queries.clone(),
                    self.config.test_duration,
                ))
            })
            .collect();

        // Every worker must finish before anything is reduced.
        let mut results = Vec::new();
        for joined in futures::future::join_all(handles).await {
            let worker_results = joined.map_err(|e| BenchError::Worker(e.to_string()))?;
            results.extend(worker_results);
        }

        Ok(results)
    }
}

/// Loop the query set until the deadline passes.
///
/// The deadline is checked before each pass, so a pass that starts in time
/// always runs to completion.
async fn run_worker(
    worker_id: usize,
    backend: Arc<dyn SearchBackend>,
    index: Arc<str>,
    queries: Arc<[QueryDefinition]>,
    duration: Duration,
) -> Vec<QueryResult> {
    let start = Instant::now();
    let mut results = Vec::new();
    let mut passes = 0u64;

    while start.elapsed() < duration {
        for query in queries.iter() {
            results.push(run_query(backend.as_ref(), &index, query).await);
        }
        passes += 1;
    }

    tracing::debug!(
        worker_id,
        passes,
        results = results.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Worker finished"
    );

    results
}
