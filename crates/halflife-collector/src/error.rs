//! Error types for the collector binary.
//!
//! [`CollectorError`] wraps every failure that can stop startup. Once the
//! duty cycles are running nothing is fatal; tick failures are logged.

/// Top-level error for the collector binary.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: halflife_core::config::ConfigError,
    },

    /// The export sink could not be built.
    #[error("export error: {source}")]
    Export {
        /// The underlying export error.
        #[from]
        source: halflife_export::ExportError,
    },

    /// The observer server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: halflife_observer::ServerError,
    },

    /// The logging subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}
