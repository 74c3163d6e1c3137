//! Error types for Health Auto Export ingestion.
//!
//! [`IngestError`] fails a whole file; [`ValidationError`] drops a single
//! record and lets the rest of the batch through.

use std::path::PathBuf;

/// Errors that fail an entire source file.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The content is not JSON or lacks `data.metrics`.
    #[error("malformed export document: {source}")]
    Document {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// A single record that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {metric} record #{index}: {reason}")]
pub struct ValidationError {
    /// The metric the record belongs to.
    pub metric: String,
    /// Position of the record inside the metric's `data` array.
    pub index: usize,
    /// What was wrong with it.
    pub reason: String,
}
