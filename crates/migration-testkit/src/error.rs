//! Error types for the migration testing toolkit.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for testkit operations.
#[derive(Error, Debug)]
pub enum TestkitError {
    /// Configuration error (invalid YAML, unknown environment, missing fields)
    #[error("Configuration error: {0}")]
    Config(String),

    /// PostgreSQL connection or query error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// SQL Server connection or query error
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A single table could not be read during capture
    #[error("Capture failed for table {table}: {message}")]
    Capture { table: String, message: String },

    /// Baseline snapshot file does not exist
    #[error("Baseline snapshot not found: {0:?}")]
    BaselineMissing(PathBuf),

    /// Baseline snapshot file exists but is not valid snapshot JSON
    #[error("Invalid baseline snapshot {path:?}: {source}")]
    BaselineFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP request error during endpoint smoke tests
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV export error (load test results)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TestkitError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        TestkitError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Capture error for a specific table
    pub fn capture(table: impl Into<String>, message: impl ToString) -> Self {
        TestkitError::Capture {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for testkit operations.
pub type Result<T> = std::result::Result<T, TestkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_includes_context() {
        let err = TestkitError::pool("timed out", "acquiring snapshot connection");
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("acquiring snapshot connection"));
    }

    #[test]
    fn test_baseline_missing_shows_path() {
        let err = TestkitError::BaselineMissing(PathBuf::from("/tmp/baseline.json"));
        assert!(err.to_string().contains("/tmp/baseline.json"));
    }

    #[test]
    fn test_format_detailed_walks_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TestkitError::Io(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
    }
}
