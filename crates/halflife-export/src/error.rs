//! Error types for metric export.

/// Errors that can occur while pushing samples.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The underlying reqwest error.
        source: reqwest::Error,
    },

    /// The push did not reach the backend or was refused by it.
    #[error("failed to push {metric}: {reason}")]
    Transport {
        /// The series being pushed.
        metric: String,
        /// What went wrong.
        reason: String,
    },
}
