//! The series emitted for each tracked quantity.
//!
//! Every computed sample carries `source="calculation"`. The decayed
//! value and the raw trailing total share a series name and are told apart
//! by `kind="rolling"` / `kind="total"`; a projection gets its own series.

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone, Utc};
use halflife_core::backfill::BackfillPoint;
use halflife_core::config::QuantityConfig;
use halflife_core::engine::{DecayEngine, Reading};
use halflife_types::{ExportBatch, ExportPoint};

/// `source` label value for every computed sample.
pub const CALCULATION_SOURCE: &str = "calculation";

/// The decayed value of `metric_name` at `at`.
pub fn rolling_point(metric_name: &str, value: f64, at: DateTime<Utc>) -> ExportPoint {
    ExportPoint::new(metric_name, value, at)
        .with_label("source", CALCULATION_SOURCE)
        .with_label("kind", "rolling")
}

/// The undecayed trailing-window total of `metric_name` at `at`.
pub fn total_point(metric_name: &str, value: f64, at: DateTime<Utc>) -> ExportPoint {
    ExportPoint::new(metric_name, value, at)
        .with_label("source", CALCULATION_SOURCE)
        .with_label("kind", "total")
}

/// A projected value, sampled at `at`.
pub fn projection_point(metric_name: &str, value: f64, at: DateTime<Utc>) -> ExportPoint {
    ExportPoint::new(metric_name, value, at).with_label("source", CALCULATION_SOURCE)
}

/// Every point a quantity emits for the instant `at`: the rolling value,
/// then the trailing total and the projection if configured.
pub async fn quantity_points(
    engine: &DecayEngine,
    config: &QuantityConfig,
    at: DateTime<Utc>,
) -> Vec<ExportPoint> {
    let reading = read_quantity(engine, config, at).await;
    reading_points(config, &reading, at)
}

/// One engine reading covering every series `config` emits at `at`.
///
/// The projection targets the next occurrence of its local wall-clock
/// time in the host's time zone.
pub async fn read_quantity(
    engine: &DecayEngine,
    config: &QuantityConfig,
    at: DateTime<Utc>,
) -> Reading {
    let target = config
        .projection
        .as_ref()
        .and_then(|projection| projection.time_of_day().ok())
        .and_then(|time| next_occurrence(at, time, &Local));
    engine.reading(at, config.total_window(), target).await
}

/// The points for a reading taken at `at`, in emission order.
pub fn reading_points(
    config: &QuantityConfig,
    reading: &Reading,
    at: DateTime<Utc>,
) -> Vec<ExportPoint> {
    let mut points = vec![rolling_point(&config.metric_name, reading.value, at)];

    if let Some(total) = reading.total {
        points.push(total_point(&config.metric_name, total, at));
    }
    if let (Some(projection), Some(value)) = (&config.projection, reading.projected) {
        points.push(projection_point(&projection.metric_name, value, at));
    }

    points
}

/// Rolling points for a backfill plan, in plan order.
pub fn backfill_batch(metric_name: &str, plan: &[BackfillPoint]) -> ExportBatch {
    let points = plan
        .iter()
        .map(|p| rolling_point(metric_name, p.value, p.instant))
        .collect();
    ExportBatch::new(metric_name, points)
}

/// The first instant at or after `now` whose wall-clock time in `tz` is
/// `time`. Skips a day when `time` falls into a DST gap.
pub fn next_occurrence<Tz: TimeZone>(
    now: DateTime<Utc>,
    time: NaiveTime,
    tz: &Tz,
) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(tz).date_naive();
    (0..=2)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| tz.from_local_datetime(&date.and_time(time)).earliest())
        .map(|local| local.with_timezone(&Utc))
        .find(|candidate| *candidate >= now)
}
