//! Shared type definitions for the halflife collector.
//!
//! This crate is the single source of truth for the data that flows
//! between ingestion, the decay engine, and the export sinks.
//!
//! # Modules
//!
//! - [`enums`] -- Health Auto Export metric kinds and their record schemas
//! - [`structs`] -- Ingestion events and exported data points

pub mod enums;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{MetricKind, RecordSchema};
pub use structs::{Event, ExportBatch, ExportPoint};
