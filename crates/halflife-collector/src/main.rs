//! Collector binary for decaying health metrics.
//!
//! Wires the Health Auto Export file source, one decay engine per tracked
//! quantity, the metric sink, and the observer server together, then runs
//! the duty cycles until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$HALFLIFE_CONFIG` or `halflife.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the metric sink and the file source
//! 4. Create one engine per quantity and spawn its ingestion and export cycles
//! 5. Spawn the pass-through cycle, if enabled
//! 6. Start the observer server, if enabled
//! 7. Wait for Ctrl-C, flip the shutdown watch, and join every task

mod cycles;
mod error;
mod passthrough;

use std::path::PathBuf;
use std::sync::Arc;

use halflife_core::backfill::BackfillPlanner;
use halflife_core::clock::{Clock, SystemClock};
use halflife_core::config::{ConfigError, HalflifeConfig, LogFormat, LoggingConfig};
use halflife_core::engine::DecayEngine;
use halflife_export::MetricSink;
use halflife_ingest::IntradaySource;
use halflife_observer::{AppState, ServerConfig, TrackedQuantity};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::CollectorError;

/// Default config file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "halflife.yaml";

/// Application entry point for the collector.
///
/// # Errors
///
/// Returns an error if configuration, logging, the sink, or the observer
/// cannot be set up. Nothing after startup is fatal.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so note where it came from.
    let (config, origin) = load_config()?;
    let origin = origin.map_or_else(|| "defaults".to_owned(), |p| p.display().to_string());

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        origin = %origin,
        quantities = config.quantities.len(),
        export_backend = ?config.export.backend,
        "Configuration loaded"
    );

    // 3. Sink and source.
    let sink = MetricSink::from_config(&config.export).map_err(CollectorError::from)?;
    let source = IntradaySource::from_config(&config.ingest);
    info!(
        sink = sink.name(),
        root = %config.ingest.root,
        automation = %config.ingest.automation,
        "Sink and source ready"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    // 4. One engine and two duty cycles per quantity.
    let mut tracked = Vec::with_capacity(config.quantities.len());
    for quantity in &config.quantities {
        let engine = DecayEngine::new(
            quantity.name.clone(),
            quantity.decay_parameters()?,
            quantity.backfill_planner()?,
            Arc::clone(&clock),
        );
        let grid = BackfillPlanner::new(quantity.tick_interval()).map_err(|source| {
            ConfigError::Decay {
                quantity: quantity.name.clone(),
                source,
            }
        })?;
        let entry = TrackedQuantity {
            engine: Arc::new(engine),
            config: quantity.clone(),
        };

        handles.push(cycles::spawn_ingest_cycle(
            entry.clone(),
            source.clone(),
            sink.clone(),
            shutdown_rx.clone(),
        ));
        handles.push(cycles::spawn_export_cycle(
            entry.clone(),
            grid,
            sink.clone(),
            shutdown_rx.clone(),
        ));
        info!(
            quantity = %quantity.name,
            metric = %quantity.metric_name,
            half_life_ms = quantity.half_life_ms,
            "Quantity tracked"
        );
        tracked.push(entry);
    }

    // 5. Pass-through forwarding.
    if config.passthrough.enabled {
        handles.push(passthrough::spawn_passthrough_cycle(
            config.passthrough.poll_interval(),
            source.clone(),
            sink.clone(),
            Arc::clone(&clock),
            shutdown_rx.clone(),
        ));
    }

    // 6. Observer API server.
    if config.observer.enabled {
        let server_config = ServerConfig::from(&config.observer);
        let state = Arc::new(AppState::new(tracked));
        let handle =
            halflife_observer::spawn_observer(&server_config, state, shutdown_rx.clone())
                .await
                .map_err(CollectorError::from)?;
        handles.push(handle);
    }

    info!(tasks = handles.len(), "halflife-collector running");

    // 7. Run until interrupted.
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C, shutting down");
    }
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            tracing::warn!(error = %e, "task ended abnormally");
        }
    }

    info!("halflife-collector shutdown complete");
    Ok(())
}

/// Load configuration.
///
/// `$HALFLIFE_CONFIG` names the file if set; otherwise `halflife.yaml` is
/// used when present, and built-in defaults when not. Environment
/// overrides apply in every case. Returns the file that was read, if any.
fn load_config() -> Result<(HalflifeConfig, Option<PathBuf>), CollectorError> {
    let path = match std::env::var_os("HALFLIFE_CONFIG") {
        Some(path) => Some(PathBuf::from(path)),
        None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
    };

    if let Some(path) = path {
        let config = HalflifeConfig::from_file(&path)?;
        return Ok((config, Some(path)));
    }

    let mut config = HalflifeConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok((config, None))
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), CollectorError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level).map_err(|e| CollectorError::Logging {
            message: format!("invalid log level {:?}: {e}", logging.level),
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = match logging.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| CollectorError::Logging {
        message: e.to_string(),
    })
}
