//! Search benchmark core.
//!
//! This module provides:
//! - Query definitions and the single-query runner
//! - Benchmark runner fanning the query set out over concurrent workers
//! - Per-query statistics (error rate, latency percentiles, throughput)
//! - Results persistence and Markdown report rendering
//! - Mock search cluster for standalone runs

pub mod config;
pub mod metrics;
pub mod mock_server;
pub mod query;
pub mod report;
pub mod runner;

pub use config::{BenchmarkConfig, MockClusterConfig};
pub use metrics::{compute_statistics, LatencyStats, QueryStatistics};
pub use mock_server::MockSearchCluster;
pub use query::{run_query, QueryDefinition, QueryResult, SearchBody};
pub use report::{render_markdown, BenchmarkResults, BenchmarkRun};
pub use runner::BenchmarkRunner;
