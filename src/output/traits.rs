//! Result sink trait and output error types
//!
//! Workers hand every successful record to a [`ResultSink`]. Implementations
//! are shared across all workers of a batch and must serialize their writes.

use super::ProfileRecord;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for successfully extracted records
///
/// `append` may be called concurrently from every worker of a batch. Each call
/// must either write the whole row or nothing.
pub trait ResultSink: Send + Sync {
    /// Appends one record
    ///
    /// # Arguments
    ///
    /// * `record` - The record to persist; its `error` field is written as-is
    fn append(&self, record: &ProfileRecord) -> OutputResult<()>;
}
