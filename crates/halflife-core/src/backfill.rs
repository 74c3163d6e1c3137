//! Recomputation plan for late-arriving historical data.
//!
//! Ingestion batches can carry events older than the most recently
//! exported point. When a batch mixes new timestamps with ones the store
//! already held, every rolling value exported between the earliest new
//! event and now is stale. The [`BackfillPlanner`] derives the grid of
//! instants to recompute and evaluates the aggregate at each of them.
//!
//! # Algorithm
//!
//! 1. Trigger only when `0 < new_count != batch_len`.
//! 2. Grid: `earliest, earliest + step, ...` up to and including
//!    `floor(now, step)`.
//! 3. Skip the instants before the oldest stored event, which evaluate to
//!    zero, then evaluate `value_at_time` per instant and drop exact zeros.
//!
//! A purely new batch is a normal forward tick; the next regular export
//! covers it and no history is touched.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregator::Aggregator;
use crate::decay::DecayError;
use crate::store::UpsertReport;

/// One recomputed historical value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackfillPoint {
    /// The grid instant.
    pub instant: DateTime<Utc>,
    /// The rolling aggregate at that instant.
    pub value: f64,
}

/// Plans backfill grids at a fixed step size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillPlanner {
    /// Grid step in whole milliseconds (at least 1).
    step_ms: i64,
}

impl BackfillPlanner {
    /// Create a planner stepping by `step`, normally the export tick interval.
    ///
    /// # Errors
    ///
    /// Returns [`DecayError::InvalidParameters`] if `step` is shorter than
    /// one millisecond or does not fit in an `i64` of milliseconds.
    pub fn new(step: Duration) -> Result<Self, DecayError> {
        let step_ms = i64::try_from(step.as_millis()).map_err(|_err| {
            DecayError::InvalidParameters {
                reason: "backfill step exceeds i64 milliseconds".to_owned(),
            }
        })?;
        if step_ms < 1 {
            return Err(DecayError::InvalidParameters {
                reason: "backfill step must be at least 1ms".to_owned(),
            });
        }
        Ok(Self { step_ms })
    }

    /// The grid step.
    pub fn step(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.step_ms).unwrap_or(1))
    }

    /// The instant backfill should start from, or `None` if the upsert
    /// does not call for one.
    pub fn trigger(&self, report: &UpsertReport) -> Option<DateTime<Utc>> {
        if report.is_retroactive() {
            report.earliest_inserted()
        } else {
            None
        }
    }

    /// Floor `instant` to a whole multiple of the step since the epoch.
    pub fn floor(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let millis = instant.timestamp_millis();
        millis
            .checked_rem_euclid(self.step_ms)
            .and_then(|rem| millis.checked_sub(rem))
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(instant)
    }

    /// The closed grid from `earliest` to `floor(now)`, produced lazily.
    ///
    /// Empty when `earliest >= now`.
    pub fn grid(
        &self,
        earliest: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = DateTime<Utc>> {
        self.grid_from(earliest, earliest, now)
    }

    /// The instants of `grid(earliest, now)` at or after `from`.
    ///
    /// Jumps straight to the first such instant, so a far-off `earliest`
    /// costs nothing when `from` is recent.
    fn grid_from(
        &self,
        earliest: DateTime<Utc>,
        from: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = DateTime<Utc>> {
        let end = (earliest < now).then(|| self.floor(now).timestamp_millis());
        let step_ms = self.step_ms;

        std::iter::successors(self.first_at_or_after(earliest, from), move |cursor| {
            cursor.checked_add(step_ms)
        })
        .take_while(move |cursor| end.is_some_and(|end| *cursor <= end))
        .filter_map(DateTime::from_timestamp_millis)
    }

    /// First grid position `earliest + k * step` (k >= 0) not before `from`,
    /// in epoch milliseconds.
    fn first_at_or_after(&self, earliest: DateTime<Utc>, from: DateTime<Utc>) -> Option<i64> {
        let start = earliest.timestamp_millis();
        if from <= earliest {
            return Some(start);
        }

        let gap = from.timestamp_millis().checked_sub(start)?;
        let steps = gap
            .checked_add(self.step_ms.checked_sub(1)?)?
            .checked_div(self.step_ms)?;
        start.checked_add(steps.checked_mul(self.step_ms)?)
    }

    /// Plan and evaluate a backfill for `report` against the store behind
    /// `aggregator`. Returns an empty plan when no backfill is needed.
    ///
    /// Instants before the oldest surviving event evaluate to zero, so the
    /// grid is only walked from there on.
    pub fn plan(
        &self,
        report: &UpsertReport,
        aggregator: &Aggregator<'_>,
        now: DateTime<Utc>,
    ) -> Vec<BackfillPoint> {
        let Some(earliest) = self.trigger(report) else {
            return Vec::new();
        };
        let Some(first_stored) = aggregator.first_timestamp() else {
            return Vec::new();
        };

        self.grid_from(earliest, first_stored, now)
            .map(|instant| BackfillPoint {
                instant,
                value: aggregator.value_at_time(instant),
            })
            .filter(|point| point.value != 0.0)
            .collect()
    }
}
