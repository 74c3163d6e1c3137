//! Enumeration types for the halflife collector.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of a Health Auto Export metric, keyed by its `name` field.
///
/// Known names map to dedicated variants so the ingestion boundary can
/// pick a record schema per kind. Anything else is carried through as
/// [`MetricKind::Other`] and ignored by the collectors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricKind {
    /// Caffeine intake in milligrams (`dietary_caffeine`).
    DietaryCaffeine,
    /// Water intake in fluid ounces or millilitres (`dietary_water`).
    DietaryWater,
    /// Heart rate samples with min/avg/max (`heart_rate`).
    HeartRate,
    /// Daily resting heart rate (`resting_heart_rate`).
    RestingHeartRate,
    /// Step count increments (`step_count`).
    StepCount,
    /// Walking and running distance increments (`walking_running_distance`).
    WalkingRunningDistance,
    /// Any metric name the collector does not track.
    Other(String),
}

impl MetricKind {
    /// Resolve a metric kind from its wire name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "dietary_caffeine" => Self::DietaryCaffeine,
            "dietary_water" => Self::DietaryWater,
            "heart_rate" => Self::HeartRate,
            "resting_heart_rate" => Self::RestingHeartRate,
            "step_count" => Self::StepCount,
            "walking_running_distance" => Self::WalkingRunningDistance,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The wire name of this metric kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::DietaryCaffeine => "dietary_caffeine",
            Self::DietaryWater => "dietary_water",
            Self::HeartRate => "heart_rate",
            Self::RestingHeartRate => "resting_heart_rate",
            Self::StepCount => "step_count",
            Self::WalkingRunningDistance => "walking_running_distance",
            Self::Other(name) => name,
        }
    }

    /// The record schema HAE uses for this kind.
    pub const fn record_schema(&self) -> RecordSchema {
        match self {
            Self::HeartRate => RecordSchema::HeartRate,
            Self::DietaryCaffeine | Self::RestingHeartRate => RecordSchema::Quantity,
            Self::DietaryWater
            | Self::StepCount
            | Self::WalkingRunningDistance
            | Self::Other(_) => RecordSchema::StrictQuantity,
        }
    }
}

/// Shape of one record inside a metric's `data` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSchema {
    /// `Min`/`Max`/`Avg` beats per minute.
    HeartRate,
    /// A `qty` sample. Keys beyond `qty`, `date` and `source` are ignored.
    Quantity,
    /// A `qty` sample that rejects any other key.
    StrictQuantity,
}

impl From<String> for MetricKind {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<MetricKind> for String {
    fn from(kind: MetricKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
