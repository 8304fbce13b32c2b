//! Configuration structs for benchmarking.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::query::{validate_set, QueryDefinition};
use crate::error::{BenchError, Result};

/// Default index the built-in query set targets
pub const DEFAULT_INDEX: &str = "sample-companies";

/// Configuration for the mock search cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockClusterConfig {
    /// Port to listen on (0 for random)
    pub port: u16,
    /// Index the mock answers for; other indices return 404
    pub index_name: String,
    /// Simulated latency per search in milliseconds
    pub latency_ms: u64,
    /// Total hit count reported by every search
    pub hit_count: u64,
    /// Error rate (0.0 to 1.0)
    pub error_rate: f64,
}

impl Default for MockClusterConfig {
    fn default() -> Self {
        Self {
            port: 0,
            index_name: DEFAULT_INDEX.to_string(),
            latency_ms: 5,
            hit_count: 1000,
            error_rate: 0.0,
        }
    }
}

/// Configuration for a benchmark run against one cluster
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Index every query is sent to
    pub index_name: String,
    /// Number of concurrent workers
    pub num_clients: usize,
    /// How long each worker keeps starting new passes
    pub test_duration: Duration,
    /// Queries run top-to-bottom on every pass
    pub queries: Vec<QueryDefinition>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_INDEX.to_string(),
            num_clients: 10,
            test_duration: Duration::from_secs(20),
            queries: QueryDefinition::default_set(),
        }
    }
}

impl BenchmarkConfig {
    /// Reject configurations that cannot produce a run
    pub fn validate(&self) -> Result<()> {
        if self.num_clients < 1 {
            return Err(BenchError::Config(
                "num_clients must be at least 1".to_string(),
            ));
        }
        if self.test_duration.is_zero() {
            return Err(BenchError::Config(
                "test_duration must be greater than zero".to_string(),
            ));
        }
        if self.index_name.trim().is_empty() {
            return Err(BenchError::Config("index_name is empty".to_string()));
        }
        validate_set(&self.queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BenchmarkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queries.len(), 5);
        assert_eq!(config.index_name, "sample-companies");
    }

    #[test]
    fn test_zero_clients_rejected() {
        let config = BenchmarkConfig {
            num_clients: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("num_clients"));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let config = BenchmarkConfig {
            test_duration: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("test_duration"));
    }

    #[test]
    fn test_empty_query_set_rejected() {
        let config = BenchmarkConfig {
            queries: vec![],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BenchError::Config(_))));
    }
}
