//! Point and window aggregation over an [`EventStore`].
//!
//! Two distinct questions are answered here:
//!
//! - **rolling aggregate** ([`Aggregator::value_at_time`]): how much is
//!   still active at an instant, summing decayed contributions;
//! - **windowed total** ([`Aggregator::windowed_total`]): how much was
//!   ingested in a trailing window, summing raw quantities.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use halflife_types::Event;
use serde::Serialize;

use crate::store::EventStore;

/// One stored event together with its decayed contribution at an instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    /// The stored event.
    pub event: Event,
    /// Milliseconds between the event and the query instant (negative if
    /// the event lies in the future).
    pub age_ms: i64,
    /// Decayed contribution at the query instant.
    pub value: f64,
}

/// Read-only aggregation view over a store.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator<'a> {
    store: &'a EventStore,
}

impl<'a> Aggregator<'a> {
    /// Aggregate over `store`.
    pub const fn new(store: &'a EventStore) -> Self {
        Self { store }
    }

    /// Sum of every stored event's decayed contribution at `at`.
    pub fn value_at_time(&self, at: DateTime<Utc>) -> f64 {
        let decay = self.store.decay();
        self.store.iter().map(|event| decay.value_at(event, at)).sum()
    }

    /// Timestamp of the oldest stored event.
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.store.iter().next().map(|event| event.timestamp)
    }

    /// Sum of raw quantities with timestamps in `(at - window, at]`.
    pub fn windowed_total(&self, at: DateTime<Utc>, window: Duration) -> f64 {
        let start = TimeDelta::from_std(window)
            .ok()
            .and_then(|delta| at.checked_sub_signed(delta));

        self.store
            .iter()
            .filter(|event| event.timestamp <= at)
            .filter(|event| start.is_none_or(|start| event.timestamp > start))
            .map(|event| event.quantity)
            .sum()
    }

    /// Per-event contributions at `at`, in timestamp order.
    pub fn contributions(&self, at: DateTime<Utc>) -> Vec<Contribution> {
        let decay = self.store.decay();
        self.store
            .iter()
            .map(|event| Contribution {
                event: event.clone(),
                age_ms: at.signed_duration_since(event.timestamp).num_milliseconds(),
                value: decay.value_at(event, at),
            })
            .collect()
    }
}
