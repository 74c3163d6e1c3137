//! Core data structs: ingestion events and exported data points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// A single normalized ingestion event.
///
/// The timestamp is the uniqueness key inside an event store: ingesting a
/// second event with the same timestamp replaces the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the intake happened (millisecond resolution).
    pub timestamp: DateTime<Utc>,
    /// The ingested amount, in the metric's native unit.
    pub quantity: f64,
    /// The device or app that recorded the event, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Event {
    /// Create an event without a source.
    pub const fn new(timestamp: DateTime<Utc>, quantity: f64) -> Self {
        Self {
            timestamp,
            quantity,
            source: None,
        }
    }

    /// Attach the recording source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// One sample pushed to the metrics backend.
///
/// Labels keep their insertion order; the wire format renders them in
/// the order they were added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportPoint {
    /// Series name, e.g. `health_dietary_water`.
    pub metric_name: String,
    /// Sample value.
    pub value: f64,
    /// Sample time as Unix epoch milliseconds.
    pub timestamp_ms: i64,
    /// Ordered label pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<(String, String)>,
}

impl ExportPoint {
    /// Create an unlabelled point at the given instant.
    pub fn new(metric_name: impl Into<String>, value: f64, at: DateTime<Utc>) -> Self {
        Self {
            metric_name: metric_name.into(),
            value,
            timestamp_ms: at.timestamp_millis(),
            labels: Vec::new(),
        }
    }

    /// Append a label. Order of calls is the rendered order.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// The sample time as a `DateTime`, if representable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

/// A group of points pushed to the backend in a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBatch {
    /// The series the batch belongs to, used for logging.
    pub metric_name: String,
    /// The points, in emission order.
    pub points: Vec<ExportPoint>,
}

impl ExportBatch {
    /// Create a batch.
    pub fn new(metric_name: impl Into<String>, points: Vec<ExportPoint>) -> Self {
        Self {
            metric_name: metric_name.into(),
            points,
        }
    }

    /// Number of points in the batch.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the batch has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn labels_keep_insertion_order() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let point = ExportPoint::new("health_dietary_water", 12.5, at)
            .with_label("source", "calculation")
            .with_label("kind", "rolling");

        assert_eq!(point.labels[0].0, "source");
        assert_eq!(point.labels[1].0, "kind");
        assert_eq!(point.timestamp_ms, 1_717_243_200_000);
        assert_eq!(point.timestamp(), Some(at));
    }

    #[test]
    fn event_source_is_optional_in_json() {
        let json = r#"{"timestamp":"2024-06-01T08:00:00Z","quantity":95.0}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(event.source.is_none());

        let with_source = event.clone().with_source("Caffeine Tracker");
        let out = serde_json::to_value(&with_source).unwrap();
        assert_eq!(out["source"], "Caffeine Tracker");
        let out = serde_json::to_value(&event).unwrap();
        assert!(out.get("source").is_none());
    }

    #[test]
    fn empty_batch_reports_empty() {
        let batch = ExportBatch::new("health_heart_rate", Vec::new());
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
