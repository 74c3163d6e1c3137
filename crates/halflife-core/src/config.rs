//! Configuration loading and typed config structures for the collector.
//!
//! The configuration lives in a YAML file (`halflife.yaml` by default).
//! This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads, overrides from the
//! environment, and validates it. Every section has defaults, so an empty
//! file tracks caffeine and water with the stock parameters.
//!
//! Durations are integer milliseconds (`*_ms`) throughout.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::backfill::BackfillPlanner;
use crate::decay::{DEFAULT_PRUNE_THRESHOLD, DecayError, DecayParameters};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },

    /// Decay parameters for a quantity are invalid.
    #[error("invalid decay parameters for {quantity}: {source}")]
    Decay {
        /// The quantity whose parameters were rejected.
        quantity: String,
        /// The underlying decay error.
        source: DecayError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level collector configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HalflifeConfig {
    /// Where and how raw Health Auto Export files are read.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Where computed samples are pushed.
    #[serde(default)]
    pub export: ExportConfig,

    /// The HTTP scrape/status server.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Log level and format.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics forwarded without decay (heart rate, steps, distance).
    #[serde(default)]
    pub passthrough: PassthroughConfig,

    /// Decaying quantities, one engine each.
    #[serde(default = "default_quantities")]
    pub quantities: Vec<QuantityConfig>,
}

impl Default for HalflifeConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            export: ExportConfig::default(),
            observer: ObserverConfig::default(),
            logging: LoggingConfig::default(),
            passthrough: PassthroughConfig::default(),
            quantities: default_quantities(),
        }
    }
}

impl HalflifeConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `HEALTH_EXPORT_ROOT` overrides `ingest.root`
    /// - `VICTORIA_METRICS_URL` overrides `export.url`
    /// - `OBSERVER_PORT` overrides `observer.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or a
    /// validation error from [`HalflifeConfig::validate`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string, without
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or a
    /// validation error.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `OBSERVER_PORT` is not a port number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(root) = std::env::var("HEALTH_EXPORT_ROOT") {
            self.ingest.root = root;
        }
        if let Ok(url) = std::env::var("VICTORIA_METRICS_URL") {
            self.export.url = url;
        }
        if let Ok(port) = std::env::var("OBSERVER_PORT") {
            self.observer.port = port.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("invalid OBSERVER_PORT {port:?}: {e}"),
            })?;
        }
        Ok(())
    }

    /// Check every value that would make the collector misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] or [`ConfigError::Decay`] naming
    /// the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.lookback_days == 0 {
            return Err(invalid("ingest.lookback_days must be at least 1"));
        }
        if self.export.timeout_ms == 0 {
            return Err(invalid("export.timeout_ms must be greater than zero"));
        }
        if self.passthrough.enabled && self.passthrough.poll_interval_ms == 0 {
            return Err(invalid("passthrough.poll_interval_ms must be greater than zero"));
        }
        if self.quantities.is_empty() && !self.passthrough.enabled {
            return Err(invalid("no quantities configured and passthrough disabled"));
        }

        let mut seen = BTreeSet::new();
        for quantity in &self.quantities {
            if !seen.insert(quantity.name.as_str()) {
                return Err(ConfigError::Invalid {
                    reason: format!("quantity {} is configured twice", quantity.name),
                });
            }
            quantity.validate()?;
        }
        Ok(())
    }
}

/// Build a [`ConfigError::Invalid`] from a static message.
fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// Health Auto Export file source settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngestConfig {
    /// Directory holding one sub-directory per automation.
    #[serde(default = "default_export_root")]
    pub root: String,

    /// Automation sub-directory to read (e.g. `Intraday`).
    #[serde(default = "default_automation")]
    pub automation: String,

    /// Number of local calendar days read per poll, counting today.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            root: default_export_root(),
            automation: default_automation(),
            lookback_days: default_lookback_days(),
        }
    }
}

/// Which export sink receives computed samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportBackend {
    /// Push to a VictoriaMetrics Prometheus import endpoint.
    #[default]
    VictoriaMetrics,
    /// Only log what would be pushed.
    Log,
}

/// Export sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExportConfig {
    /// Which sink to use.
    #[serde(default)]
    pub backend: ExportBackend,

    /// Base URL of the metrics backend.
    #[serde(default = "default_export_url")]
    pub url: String,

    /// Per-request timeout.
    #[serde(default = "default_export_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            backend: ExportBackend::default(),
            url: default_export_url(),
            timeout_ms: default_export_timeout_ms(),
        }
    }
}

impl ExportConfig {
    /// The per-request timeout.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Observer HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Whether to run the server at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging settings. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Pass-through forwarding of non-decaying metrics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PassthroughConfig {
    /// Whether heart rate, step count, and distance are forwarded.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How often the source files are polled for them.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl PassthroughConfig {
    /// The poll interval.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// A projection of the rolling value to the next occurrence of a local
/// wall-clock time (e.g. bedtime).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectionConfig {
    /// Series name for the projected value.
    pub metric_name: String,

    /// Local time of day, `HH:MM`.
    pub local_time: String,
}

impl ProjectionConfig {
    /// Parse [`ProjectionConfig::local_time`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the value is not `HH:MM`.
    pub fn time_of_day(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.local_time, "%H:%M").map_err(|e| ConfigError::Invalid {
            reason: format!("invalid projection local_time {:?}: {e}", self.local_time),
        })
    }
}

/// One decaying quantity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuantityConfig {
    /// Health Auto Export metric name to ingest (e.g. `dietary_water`).
    pub name: String,

    /// Exported series name (e.g. `health_dietary_water`).
    pub metric_name: String,

    /// Half-life of a single intake.
    pub half_life_ms: u64,

    /// Ramp-in time of a single intake.
    #[serde(default)]
    pub ingestion_delay_ms: u64,

    /// Contributions below this are pruned.
    #[serde(default = "default_prune_threshold")]
    pub prune_threshold: f64,

    /// Single intakes above this are discarded as upstream artifacts.
    #[serde(default)]
    pub sanity_ceiling: Option<f64>,

    /// How often the source files are polled.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often the rolling value is exported.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Backfill grid step; defaults to `tick_interval_ms`.
    #[serde(default)]
    pub backfill_step_ms: Option<u64>,

    /// If set, also export the raw total over this trailing window.
    #[serde(default)]
    pub total_window_ms: Option<u64>,

    /// If set, also export a projection to a local time of day.
    #[serde(default)]
    pub projection: Option<ProjectionConfig>,
}

impl QuantityConfig {
    /// Build validated decay parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Decay`] if any parameter is out of range.
    pub fn decay_parameters(&self) -> Result<DecayParameters, ConfigError> {
        let params = DecayParameters::new(
            Duration::from_millis(self.half_life_ms),
            Duration::from_millis(self.ingestion_delay_ms),
        )
        .and_then(|p| p.with_prune_threshold(self.prune_threshold))
        .and_then(|p| match self.sanity_ceiling {
            Some(ceiling) => p.with_sanity_ceiling(ceiling),
            None => Ok(p),
        });

        params.map_err(|source| ConfigError::Decay {
            quantity: self.name.clone(),
            source,
        })
    }

    /// Build the backfill planner.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Decay`] if the step is zero.
    pub fn backfill_planner(&self) -> Result<BackfillPlanner, ConfigError> {
        BackfillPlanner::new(self.backfill_step()).map_err(|source| ConfigError::Decay {
            quantity: self.name.clone(),
            source,
        })
    }

    /// The ingestion poll interval.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The export tick interval.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// The backfill grid step.
    pub fn backfill_step(&self) -> Duration {
        Duration::from_millis(self.backfill_step_ms.unwrap_or(self.tick_interval_ms))
    }

    /// The windowed-total window, if configured.
    pub fn total_window(&self) -> Option<Duration> {
        self.total_window_ms.map(Duration::from_millis)
    }

    /// Validate this quantity on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] or [`ConfigError::Decay`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metric_name.is_empty() {
            return Err(ConfigError::Invalid {
                reason: format!("quantity {} has an empty metric_name", self.name),
            });
        }
        if self.poll_interval_ms == 0 || self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: format!("quantity {} has a zero poll or tick interval", self.name),
            });
        }
        if self.total_window_ms == Some(0) {
            return Err(ConfigError::Invalid {
                reason: format!("quantity {} has a zero total_window_ms", self.name),
            });
        }
        self.decay_parameters()?;
        self.backfill_planner()?;
        if let Some(projection) = &self.projection {
            projection.time_of_day()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_true() -> bool {
    true
}

fn default_export_root() -> String {
    "health-export".to_owned()
}

fn default_automation() -> String {
    "Intraday".to_owned()
}

const fn default_lookback_days() -> u32 {
    2
}

fn default_export_url() -> String {
    "http://localhost:8428".to_owned()
}

const fn default_export_timeout_ms() -> u64 {
    10_000
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    9464
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_prune_threshold() -> f64 {
    DEFAULT_PRUNE_THRESHOLD
}

const fn default_poll_interval_ms() -> u64 {
    4 * 60 * 1000
}

const fn default_tick_interval_ms() -> u64 {
    60 * 1000
}

/// Caffeine (4h half-life, bedtime projection) and water (12h, 24h total).
fn default_quantities() -> Vec<QuantityConfig> {
    const HOUR_MS: u64 = 60 * 60 * 1000;
    vec![
        QuantityConfig {
            name: "dietary_caffeine".to_owned(),
            metric_name: "health_dietary_caffeine".to_owned(),
            half_life_ms: 4 * HOUR_MS,
            ingestion_delay_ms: HOUR_MS,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            sanity_ceiling: Some(1000.0),
            poll_interval_ms: default_poll_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            backfill_step_ms: None,
            total_window_ms: None,
            projection: Some(ProjectionConfig {
                metric_name: "health_dietary_caffeine_bedtime_projection".to_owned(),
                local_time: "22:00".to_owned(),
            }),
        },
        QuantityConfig {
            name: "dietary_water".to_owned(),
            metric_name: "health_dietary_water".to_owned(),
            half_life_ms: 12 * HOUR_MS,
            ingestion_delay_ms: HOUR_MS,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            sanity_ceiling: None,
            poll_interval_ms: default_poll_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            backfill_step_ms: None,
            total_window_ms: Some(24 * HOUR_MS),
            projection: None,
        },
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = HalflifeConfig::parse("{}").unwrap();
        assert_eq!(config, HalflifeConfig::default());
        assert_eq!(config.quantities.len(), 2);
        assert_eq!(config.export.backend, ExportBackend::VictoriaMetrics);
        assert_eq!(config.ingest.automation, "Intraday");
        assert_eq!(config.ingest.lookback_days, 2);
    }

    #[test]
    fn sample_file_matches_defaults() {
        let sample = include_str!("../../../halflife.yaml");
        assert_eq!(HalflifeConfig::parse(sample).unwrap(), HalflifeConfig::default());
    }

    #[test]
    fn default_caffeine_parameters() {
        let config = HalflifeConfig::default();
        let caffeine = &config.quantities[0];
        let params = caffeine.decay_parameters().unwrap();
        assert_eq!(params.half_life(), Duration::from_secs(4 * 3600));
        assert_eq!(params.ingestion_delay(), Duration::from_secs(3600));
        assert!((params.prune_threshold() - 1.0).abs() < f64::EPSILON);
        assert_eq!(caffeine.backfill_step(), Duration::from_secs(60));
        assert_eq!(
            caffeine.projection.as_ref().unwrap().time_of_day().unwrap(),
            NaiveTime::from_hms_opt(22, 0, 0).unwrap()
        );
    }

    #[test]
    fn parses_full_quantity() {
        let yaml = r"
export:
  backend: log
logging:
  format: json
quantities:
  - name: dietary_water
    metric_name: health_dietary_water
    half_life_ms: 43200000
    ingestion_delay_ms: 3600000
    sanity_ceiling: 200
    tick_interval_ms: 30000
    backfill_step_ms: 60000
    total_window_ms: 86400000
";
        let config = HalflifeConfig::parse(yaml).unwrap();
        assert_eq!(config.export.backend, ExportBackend::Log);
        assert_eq!(config.logging.format, LogFormat::Json);
        let water = &config.quantities[0];
        assert_eq!(water.tick_interval(), Duration::from_secs(30));
        assert_eq!(water.backfill_step(), Duration::from_secs(60));
        assert_eq!(water.total_window(), Some(Duration::from_secs(86_400)));
        assert_eq!(water.poll_interval(), Duration::from_secs(240));
        let params = water.decay_parameters().unwrap();
        assert!((params.sanity_ceiling() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_half_life_is_fatal() {
        let yaml = r"
quantities:
  - name: dietary_caffeine
    metric_name: health_dietary_caffeine
    half_life_ms: 0
";
        let err = HalflifeConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Decay { .. }), "got {err}");
    }

    #[test]
    fn zero_tick_interval_is_fatal() {
        let yaml = r"
quantities:
  - name: dietary_caffeine
    metric_name: health_dietary_caffeine
    half_life_ms: 1000
    tick_interval_ms: 0
";
        let err = HalflifeConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "got {err}");
    }

    #[test]
    fn duplicate_quantities_are_rejected() {
        let yaml = r"
quantities:
  - name: dietary_water
    metric_name: a
    half_life_ms: 1000
  - name: dietary_water
    metric_name: b
    half_life_ms: 1000
";
        let err = HalflifeConfig::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn bad_projection_time_is_rejected() {
        let yaml = r"
quantities:
  - name: dietary_caffeine
    metric_name: health_dietary_caffeine
    half_life_ms: 1000
    projection:
      metric_name: bedtime
      local_time: late
";
        assert!(HalflifeConfig::parse(yaml).is_err());
    }

    #[test]
    fn nothing_to_do_is_rejected() {
        let yaml = r"
passthrough:
  enabled: false
quantities: []
";
        assert!(HalflifeConfig::parse(yaml).is_err());
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = HalflifeConfig::parse("quantities: [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }
}
