//! Health Auto Export ingestion for the halflife collector.
//!
//! Reads the daily JSON files the Health Auto Export app writes, validates
//! every record against the schema its metric name implies, and hands the
//! collector merged, typed metrics.
//!
//! # Modules
//!
//! - [`record`] -- Typed records and the per-metric tagged variant.
//! - [`document`] -- Envelope parsing and per-record validation.
//! - [`source`] -- [`IntradaySource`], the daily-file reader.
//! - [`error`] -- [`IngestError`] and [`ValidationError`].
//!
//! [`IntradaySource`]: source::IntradaySource
//! [`IngestError`]: error::IngestError
//! [`ValidationError`]: error::ValidationError

pub mod document;
pub mod error;
pub mod record;
pub mod source;

pub use document::{ParsedDocument, merge_metrics, parse_document};
pub use error::{IngestError, ValidationError};
pub use record::{HeartRateRecord, Metric, MetricRecords, QuantityRecord, parse_date};
pub use source::{IntradaySource, Snapshot};
