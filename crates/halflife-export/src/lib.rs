//! Metric export for the halflife collector.
//!
//! - [`wire`] -- Prometheus text lines, byte for byte.
//! - [`series`] -- Labelled points for rolling values, totals, projections.
//! - [`sink`] -- [`MetricSink`]: VictoriaMetrics push, log-only, in-memory.
//! - [`error`] -- [`ExportError`].
//!
//! [`MetricSink`]: sink::MetricSink
//! [`ExportError`]: error::ExportError

pub mod error;
pub mod series;
pub mod sink;
pub mod wire;

pub use error::ExportError;
pub use sink::{LogSink, MemorySink, MetricSink, VictoriaMetricsSink};
pub use wire::{format_body, format_point};
