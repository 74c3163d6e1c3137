//! Exponential decay model with a linear ingestion ramp.
//!
//! Every ingested event contributes `quantity * 0.5^(age / half_life)` to
//! the aggregate at a query instant. During the first `ingestion_delay`
//! after the event the contribution ramps in linearly instead of
//! appearing all at once, and is clamped from below at the prune
//! threshold so a fresh event never reads as negligible.
//!
//! # Design Principles
//!
//! - [`DecayFunction::value_at`] is pure: same inputs, same output.
//! - Parameters are validated once at construction. A zero half-life is
//!   rejected rather than producing infinities downstream.
//! - Events in the future relative to the query instant contribute zero.

use std::time::Duration;

use chrono::{DateTime, Utc};
use halflife_types::Event;

/// Contribution below which an event is considered negligible, unless
/// configured otherwise.
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 1.0;

/// Errors raised while building decay parameters.
#[derive(Debug, thiserror::Error)]
pub enum DecayError {
    /// A parameter is out of its valid range.
    #[error("invalid decay parameters: {reason}")]
    InvalidParameters {
        /// Explanation of which parameter is wrong.
        reason: String,
    },
}

/// Per-quantity decay configuration, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayParameters {
    /// Time for a contribution to fall to 50%.
    half_life: Duration,
    /// Time over which a new event ramps in.
    ingestion_delay: Duration,
    /// Contributions below this are pruned.
    prune_threshold: f64,
    /// Quantities above this are rejected on ingestion.
    sanity_ceiling: f64,
}

impl DecayParameters {
    /// Create parameters with the default prune threshold and no ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`DecayError::InvalidParameters`] if `half_life` is zero.
    pub fn new(half_life: Duration, ingestion_delay: Duration) -> Result<Self, DecayError> {
        if half_life.is_zero() {
            return Err(DecayError::InvalidParameters {
                reason: "half_life must be greater than zero".to_owned(),
            });
        }

        Ok(Self {
            half_life,
            ingestion_delay,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            sanity_ceiling: f64::INFINITY,
        })
    }

    /// Replace the prune threshold.
    ///
    /// # Errors
    ///
    /// Returns [`DecayError::InvalidParameters`] unless the threshold is
    /// finite and strictly positive.
    pub fn with_prune_threshold(mut self, threshold: f64) -> Result<Self, DecayError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(DecayError::InvalidParameters {
                reason: format!("prune_threshold must be a positive number, got {threshold}"),
            });
        }
        self.prune_threshold = threshold;
        Ok(self)
    }

    /// Replace the sanity ceiling. `f64::INFINITY` disables it.
    ///
    /// # Errors
    ///
    /// Returns [`DecayError::InvalidParameters`] if the ceiling is NaN or
    /// not strictly positive.
    pub fn with_sanity_ceiling(mut self, ceiling: f64) -> Result<Self, DecayError> {
        if ceiling.is_nan() || ceiling <= 0.0 {
            return Err(DecayError::InvalidParameters {
                reason: format!("sanity_ceiling must be a positive number, got {ceiling}"),
            });
        }
        self.sanity_ceiling = ceiling;
        Ok(self)
    }

    /// The configured half-life.
    pub const fn half_life(&self) -> Duration {
        self.half_life
    }

    /// The configured ingestion ramp duration.
    pub const fn ingestion_delay(&self) -> Duration {
        self.ingestion_delay
    }

    /// The configured prune threshold.
    pub const fn prune_threshold(&self) -> f64 {
        self.prune_threshold
    }

    /// The configured sanity ceiling.
    pub const fn sanity_ceiling(&self) -> f64 {
        self.sanity_ceiling
    }
}

/// Maps an event and a query instant to the event's contribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayFunction {
    params: DecayParameters,
}

impl DecayFunction {
    /// Wrap validated parameters.
    pub const fn new(params: DecayParameters) -> Self {
        Self { params }
    }

    /// The parameters this function evaluates with.
    pub const fn params(&self) -> &DecayParameters {
        &self.params
    }

    /// Contribution of `event` at instant `at`.
    ///
    /// - future events (negative age) contribute `0.0`;
    /// - inside the ingestion ramp the contribution is
    ///   `max(prune_threshold, base * age / ingestion_delay)`;
    /// - afterwards it is the plain half-life decay `base`.
    pub fn value_at(&self, event: &Event, at: DateTime<Utc>) -> f64 {
        let age_ms = at.signed_duration_since(event.timestamp).num_milliseconds();
        if age_ms < 0 {
            return 0.0;
        }

        // Ages are bounded by the i64 millisecond range; f64 keeps ~285 years exact.
        #[allow(clippy::cast_precision_loss)]
        let age = age_ms as f64;

        let base = event.quantity * 0.5_f64.powf(age / millis(self.params.half_life));

        let delay = millis(self.params.ingestion_delay);
        if age < delay {
            // Clamped from below: a ramping event never reads under the threshold.
            (base * (age / delay)).max(self.params.prune_threshold)
        } else {
            base
        }
    }

    /// Whether `event` has decayed below the prune threshold at `at`.
    pub fn is_negligible(&self, event: &Event, at: DateTime<Utc>) -> bool {
        self.value_at(event, at) < self.params.prune_threshold
    }
}

/// A duration in fractional milliseconds.
fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
