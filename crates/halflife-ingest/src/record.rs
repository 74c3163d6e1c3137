//! Typed Health Auto Export records.
//!
//! HAE writes one JSON object per sample. The schema depends on the
//! metric: most metrics are a single `qty`, heart rate carries a
//! min/avg/max triple. Caffeine and resting heart rate samples may carry
//! keys of their own, which are ignored; every other quantity sample is
//! strict. [`MetricRecords`] is the tagged variant selected by the metric
//! name; the decay core only ever sees [`Event`]s built from quantity
//! records.

use chrono::{DateTime, Utc};
use halflife_types::{Event, MetricKind, RecordSchema};
use serde::Deserialize;

/// HAE's own timestamp layout, e.g. `2024-06-01 08:00:00 -0700`.
const HAE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// A single-quantity sample.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuantityRecord {
    /// The sample amount.
    pub qty: f64,
    /// When it was recorded, as written by HAE.
    pub date: String,
    /// Recording device or app.
    #[serde(default)]
    pub source: Option<String>,
}

/// [`QuantityRecord`] for kinds whose samples reject unknown fields.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictQuantityRecord {
    qty: f64,
    date: String,
    #[serde(default)]
    source: Option<String>,
}

impl From<StrictQuantityRecord> for QuantityRecord {
    fn from(strict: StrictQuantityRecord) -> Self {
        Self {
            qty: strict.qty,
            date: strict.date,
            source: strict.source,
        }
    }
}

/// A heart rate sample.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeartRateRecord {
    /// Minimum beats per minute over the sample.
    #[serde(rename = "Min")]
    pub min: f64,
    /// Maximum beats per minute over the sample.
    #[serde(rename = "Max")]
    pub max: f64,
    /// Average beats per minute over the sample.
    #[serde(rename = "Avg")]
    pub avg: f64,
    /// When it was recorded, as written by HAE.
    pub date: String,
    /// Recording device or app.
    #[serde(default)]
    pub source: Option<String>,
}

/// The validated records of one metric, tagged by schema.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricRecords {
    /// `qty` samples with their parsed timestamps.
    Quantity(Vec<(DateTime<Utc>, QuantityRecord)>),
    /// Heart rate samples with their parsed timestamps.
    HeartRate(Vec<(DateTime<Utc>, HeartRateRecord)>),
}

impl MetricRecords {
    /// An empty record list with the schema `kind` uses.
    pub fn empty_for(kind: &MetricKind) -> Self {
        match kind.record_schema() {
            RecordSchema::HeartRate => Self::HeartRate(Vec::new()),
            RecordSchema::Quantity | RecordSchema::StrictQuantity => Self::Quantity(Vec::new()),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        match self {
            Self::Quantity(records) => records.len(),
            Self::HeartRate(records) => records.len(),
        }
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `other`'s records. Mismatched schemas are ignored, which
    /// cannot happen for two metrics of the same kind.
    pub fn extend(&mut self, other: Self) {
        match (self, other) {
            (Self::Quantity(ours), Self::Quantity(theirs)) => ours.extend(theirs),
            (Self::HeartRate(ours), Self::HeartRate(theirs)) => ours.extend(theirs),
            _ => {}
        }
    }
}

/// A validated metric from one or more export files.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Which metric this is.
    pub kind: MetricKind,
    /// Units string as reported by HAE (e.g. `mg`, `fl_oz_us`).
    pub units: String,
    /// The records that passed validation, in file order.
    pub records: MetricRecords,
}

impl Metric {
    /// Quantity records as core events. Heart rate metrics yield nothing.
    pub fn events(&self) -> Vec<Event> {
        match &self.records {
            MetricRecords::Quantity(records) => records
                .iter()
                .map(|(timestamp, record)| Event {
                    timestamp: *timestamp,
                    quantity: record.qty,
                    source: record.source.clone(),
                })
                .collect(),
            MetricRecords::HeartRate(_) => Vec::new(),
        }
    }
}

/// Parse an HAE date, accepting HAE's own layout or RFC 3339.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, HAE_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Validate one raw JSON record against `kind`'s schema.
///
/// Returns the parsed timestamp alongside the typed record, or a reason
/// string for the caller to wrap into a validation error.
pub(crate) fn validate_record(
    kind: &MetricKind,
    raw: serde_json::Value,
) -> Result<(DateTime<Utc>, ValidRecord), String> {
    let record: QuantityRecord = match kind.record_schema() {
        RecordSchema::HeartRate => return validate_heart_rate(raw),
        RecordSchema::Quantity => serde_json::from_value::<QuantityRecord>(raw),
        RecordSchema::StrictQuantity => {
            serde_json::from_value::<StrictQuantityRecord>(raw).map(QuantityRecord::from)
        }
    }
    .map_err(|e| e.to_string())?;

    if !record.qty.is_finite() || record.qty < 0.0 {
        return Err(format!("qty must be finite and non-negative, got {}", record.qty));
    }
    let at = parse_date(&record.date).ok_or_else(|| bad_date(&record.date))?;
    Ok((at, ValidRecord::Quantity(record)))
}

fn validate_heart_rate(raw: serde_json::Value) -> Result<(DateTime<Utc>, ValidRecord), String> {
    let record: HeartRateRecord = serde_json::from_value(raw).map_err(|e| e.to_string())?;
    if ![record.min, record.max, record.avg].iter().all(|v| v.is_finite()) {
        return Err("heart rate values must be finite".to_owned());
    }
    let at = parse_date(&record.date).ok_or_else(|| bad_date(&record.date))?;
    Ok((at, ValidRecord::HeartRate(record)))
}

fn bad_date(raw: &str) -> String {
    format!("unparsable date {raw:?}")
}

/// A single validated record, before it is filed into [`MetricRecords`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ValidRecord {
    Quantity(QuantityRecord),
    HeartRate(HeartRateRecord),
}

impl MetricRecords {
    /// File a validated record. A record of the other schema is dropped.
    pub(crate) fn push(&mut self, at: DateTime<Utc>, record: ValidRecord) {
        match (self, record) {
            (Self::Quantity(records), ValidRecord::Quantity(r)) => records.push((at, r)),
            (Self::HeartRate(records), ValidRecord::HeartRate(r)) => records.push((at, r)),
            _ => {}
        }
    }
}
