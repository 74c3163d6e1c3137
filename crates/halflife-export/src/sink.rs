//! Destinations for computed samples.
//!
//! Uses enum dispatch instead of trait objects, so [`MetricSink::push`]
//! can stay a plain `async fn`. Pushes are fire-and-forget from the
//! collector's point of view: a failure is returned for logging and the
//! next tick supersedes it.

use std::sync::Arc;
use std::time::Duration;

use halflife_core::config::{ExportBackend, ExportConfig};
use halflife_types::ExportBatch;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ExportError;
use crate::wire::format_body;

/// Import path appended to the VictoriaMetrics base URL.
const IMPORT_PATH: &str = "/api/v1/import/prometheus";

// ---------------------------------------------------------------------------
// Unified sink enum
// ---------------------------------------------------------------------------

/// Where [`ExportBatch`]es go.
#[derive(Debug, Clone)]
pub enum MetricSink {
    /// HTTP push to VictoriaMetrics.
    VictoriaMetrics(VictoriaMetricsSink),
    /// Log-only dry run.
    Log(LogSink),
    /// In-memory capture.
    Memory(MemorySink),
}

impl MetricSink {
    /// Build the sink selected by the `export` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &ExportConfig) -> Result<Self, ExportError> {
        match config.backend {
            ExportBackend::VictoriaMetrics => Ok(Self::VictoriaMetrics(VictoriaMetricsSink::new(
                &config.url,
                config.timeout(),
            )?)),
            ExportBackend::Log => Ok(Self::Log(LogSink)),
        }
    }

    /// Push one batch. An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Transport`] if the request fails or the
    /// backend answers with a non-2xx status.
    pub async fn push(&self, batch: &ExportBatch) -> Result<(), ExportError> {
        if batch.is_empty() {
            return Ok(());
        }
        match self {
            Self::VictoriaMetrics(sink) => sink.push(batch).await,
            Self::Log(sink) => {
                sink.push(batch);
                Ok(())
            }
            Self::Memory(sink) => {
                sink.push(batch).await;
                Ok(())
            }
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::VictoriaMetrics(_) => "victoria-metrics",
            Self::Log(_) => "log",
            Self::Memory(_) => "memory",
        }
    }
}

// ---------------------------------------------------------------------------
// VictoriaMetrics
// ---------------------------------------------------------------------------

/// Pushes to `{base_url}/api/v1/import/prometheus`.
#[derive(Debug, Clone)]
pub struct VictoriaMetricsSink {
    client: reqwest::Client,
    url: String,
}

impl VictoriaMetricsSink {
    /// Create a sink for the VictoriaMetrics instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Client`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ExportError::Client { source })?;
        Ok(Self {
            client,
            url: import_url(base_url),
        })
    }

    /// The full import URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn push(&self, batch: &ExportBatch) -> Result<(), ExportError> {
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "text/plain")
            .body(format_body(&batch.points))
            .send()
            .await
            .map_err(|e| ExportError::Transport {
                metric: batch.metric_name.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(ExportError::Transport {
                metric: batch.metric_name.clone(),
                reason: format!("backend returned {status}: {body}"),
            });
        }

        debug!(
            metric = %batch.metric_name,
            points = batch.len(),
            "pushed batch"
        );
        Ok(())
    }
}

/// Join `base_url` and the import path without doubling the slash.
fn import_url(base_url: &str) -> String {
    format!("{}{IMPORT_PATH}", base_url.trim_end_matches('/'))
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// Logs batches instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    fn push(self, batch: &ExportBatch) {
        info!(
            metric = %batch.metric_name,
            points = batch.len(),
            body = %format_body(&batch.points),
            "would push batch"
        );
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Records batches in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    batches: Arc<Mutex<Vec<ExportBatch>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    async fn push(&self, batch: &ExportBatch) {
        self.batches.lock().await.push(batch.clone());
    }

    /// Every batch pushed so far, in order.
    pub async fn batches(&self) -> Vec<ExportBatch> {
        self.batches.lock().await.clone()
    }

    /// Drain and return the pushed batches.
    pub async fn take(&self) -> Vec<ExportBatch> {
        std::mem::take(&mut *self.batches.lock().await)
    }
}
