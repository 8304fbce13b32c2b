// Error handling module
// Defines the error type shared by the cluster client, runner and report writer

use thiserror::Error;

/// Errors that can occur while configuring, running or persisting a benchmark
#[derive(Error, Debug)]
pub enum BenchError {
    /// Invalid benchmark configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cluster could not be reached before the run started
    #[error("Connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    /// Cluster answered a search with a non-success status
    #[error("Search error: {status} - {message}")]
    Search { status: u16, message: String },

    /// Transport-level failure (DNS, TLS, timeout, reset)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response or results file was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Results could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker task died before finishing its loop
    #[error("Worker failed: {0}")]
    Worker(String),
}

/// Result type alias for benchmark operations
pub type Result<T> = std::result::Result<T, BenchError>;
