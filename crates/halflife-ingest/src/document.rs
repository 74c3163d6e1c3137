//! Whole-document parsing for Health Auto Export JSON files.
//!
//! The document envelope (`{"data": {"metrics": [...]}}`) must be intact
//! or the file is rejected. Inside each metric the `data` array is kept as
//! raw JSON values and validated record by record, so one malformed sample
//! does not cost the rest of the file.

use std::collections::BTreeMap;

use halflife_types::MetricKind;
use serde::Deserialize;
use tracing::warn;

use crate::error::{IngestError, ValidationError};
use crate::record::{Metric, MetricRecords, validate_record};

#[derive(Debug, Deserialize)]
struct RawDocument {
    data: RawData,
}

#[derive(Debug, Deserialize)]
struct RawData {
    metrics: Vec<RawMetric>,
}

#[derive(Debug, Deserialize)]
struct RawMetric {
    name: String,
    #[serde(default)]
    units: String,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// Result of parsing one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    /// Validated metrics, in document order.
    pub metrics: Vec<Metric>,
    /// Records that were dropped.
    pub rejected: Vec<ValidationError>,
}

/// Parse and validate an HAE JSON document.
///
/// Each rejected record is logged at warn level and listed in
/// [`ParsedDocument::rejected`].
///
/// # Errors
///
/// Returns [`IngestError::Document`] if the text is not JSON or lacks
/// `data.metrics`.
pub fn parse_document(json: &str) -> Result<ParsedDocument, IngestError> {
    let raw: RawDocument = serde_json::from_str(json)?;
    let mut parsed = ParsedDocument::default();

    for metric in raw.data.metrics {
        let kind = MetricKind::from_name(&metric.name);
        let mut records = MetricRecords::empty_for(&kind);

        for (index, value) in metric.data.into_iter().enumerate() {
            match validate_record(&kind, value) {
                Ok((at, record)) => records.push(at, record),
                Err(reason) => {
                    let error = ValidationError {
                        metric: metric.name.clone(),
                        index,
                        reason,
                    };
                    warn!(error = %error, "dropping invalid record");
                    parsed.rejected.push(error);
                }
            }
        }

        parsed.metrics.push(Metric {
            kind,
            units: metric.units,
            records,
        });
    }

    Ok(parsed)
}

/// Merge metrics by name, concatenating the records of repeated names in
/// the order they appear.
pub fn merge_metrics<I>(metrics: I) -> BTreeMap<MetricKind, Metric>
where
    I: IntoIterator<Item = Metric>,
{
    let mut merged: BTreeMap<MetricKind, Metric> = BTreeMap::new();
    for metric in metrics {
        if let Some(existing) = merged.get_mut(&metric.kind) {
            existing.records.extend(metric.records);
        } else {
            merged.insert(metric.kind.clone(), metric);
        }
    }
    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "data": {
        "metrics": [
          {
            "name": "dietary_caffeine",
            "units": "mg",
            "data": [
              { "qty": 95, "date": "2024-06-01 08:00:00 +0000", "source": "Phone" },
              { "qty": 64, "date": "2024-06-01 13:30:00 +0000" },
              { "qty": "lots", "date": "2024-06-01 14:00:00 +0000" }
            ]
          },
          {
            "name": "heart_rate",
            "units": "count/min",
            "data": [
              { "Min": 58, "Max": 71, "Avg": 63, "date": "2024-06-01 08:00:00 +0000", "source": "Watch" }
            ]
          },
          {
            "name": "vo2_max",
            "units": "ml/(kg·min)",
            "data": []
          }
        ]
      }
    }"#;

    #[test]
    fn parses_sample_document() {
        let parsed = parse_document(SAMPLE).unwrap();
        assert_eq!(parsed.metrics.len(), 3);

        let caffeine = &parsed.metrics[0];
        assert_eq!(caffeine.kind, MetricKind::DietaryCaffeine);
        assert_eq!(caffeine.units, "mg");
        assert_eq!(caffeine.records.len(), 2);

        let heart = &parsed.metrics[1];
        assert!(matches!(heart.records, MetricRecords::HeartRate(ref r) if r.len() == 1));

        assert_eq!(parsed.metrics[2].kind, MetricKind::Other("vo2_max".to_owned()));
    }

    #[test]
    fn invalid_record_is_reported_and_skipped() {
        let parsed = parse_document(SAMPLE).unwrap();
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].metric, "dietary_caffeine");
        assert_eq!(parsed.rejected[0].index, 2);
    }

    #[test]
    fn missing_envelope_fails_the_document() {
        assert!(parse_document(r#"{"metrics": []}"#).is_err());
        assert!(parse_document("not json").is_err());
    }

    #[test]
    fn merge_concatenates_same_named_metrics() {
        let today = parse_document(SAMPLE).unwrap();
        let yesterday = parse_document(SAMPLE).unwrap();
        let merged = merge_metrics(today.metrics.into_iter().chain(yesterday.metrics));

        assert_eq!(merged.len(), 3);
        let caffeine = merged.get(&MetricKind::DietaryCaffeine).unwrap();
        assert_eq!(caffeine.records.len(), 4);
        assert_eq!(caffeine.events().len(), 4);
    }
}
