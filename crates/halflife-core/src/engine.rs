//! Per-quantity decay engine shared between duty cycles.
//!
//! A [`DecayEngine`] owns one [`EventStore`] behind a mutex together with
//! its decay parameters, backfill planner, and clock. The ingestion and
//! export cycles for a quantity hold the same `Arc<DecayEngine>` and call
//! into it directly; the mutex is the only coordination between them.
//!
//! Every read prunes against the clock before aggregating, so a reader
//! never observes a partially-upserted or partially-pruned set and the
//! store stays bounded as long as it keeps being queried.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use halflife_types::Event;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::aggregator::{Aggregator, Contribution};
use crate::backfill::{BackfillPlanner, BackfillPoint};
use crate::clock::Clock;
use crate::decay::{DecayFunction, DecayParameters};
use crate::store::{EventStore, UpsertReport};

/// Result of handing a batch to [`DecayEngine::ingest`].
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// What the upsert did.
    pub report: UpsertReport,
    /// Recomputed historical values, empty unless the batch was retroactive.
    pub backfill: Vec<BackfillPoint>,
}

/// Aggregates of one engine taken under a single lock, so they all
/// describe the same store state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Stored events after pruning.
    pub events: usize,
    /// Rolling aggregate at the reading instant.
    pub value: f64,
    /// Trailing-window total, if a window was requested.
    pub total: Option<f64>,
    /// Rolling aggregate at the projection target, if one was requested.
    pub projected: Option<f64>,
}

/// The decaying value engine for one tracked quantity.
#[derive(Debug)]
pub struct DecayEngine {
    name: String,
    params: DecayParameters,
    planner: BackfillPlanner,
    clock: Arc<dyn Clock>,
    store: Mutex<EventStore>,
}

impl DecayEngine {
    /// Create an engine with an empty store.
    pub fn new(
        name: impl Into<String>,
        params: DecayParameters,
        planner: BackfillPlanner,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            planner,
            clock,
            store: Mutex::new(EventStore::new(DecayFunction::new(params))),
        }
    }

    /// The tracked quantity's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The decay parameters.
    pub const fn params(&self) -> &DecayParameters {
        &self.params
    }

    /// The backfill planner.
    pub const fn planner(&self) -> &BackfillPlanner {
        &self.planner
    }

    /// The engine's notion of now.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Upsert a batch and, if it filled in history, plan the backfill.
    ///
    /// The upsert, its prune, and the backfill evaluation run under a
    /// single lock acquisition.
    pub async fn ingest(&self, events: Vec<Event>) -> IngestOutcome {
        let now = self.clock.now();
        let mut store = self.store.lock().await;

        let report = store.upsert(events, now);
        let backfill = self.planner.plan(&report, &Aggregator::new(&store), now);

        if report.new_count() > 0 {
            info!(
                quantity = %self.name,
                new = report.new_count(),
                batch = report.batch_len(),
                discarded = report.discarded(),
                stored = store.len(),
                "ingested new events"
            );
        } else {
            debug!(
                quantity = %self.name,
                batch = report.batch_len(),
                discarded = report.discarded(),
                "no new events in batch"
            );
        }
        if !backfill.is_empty() {
            info!(
                quantity = %self.name,
                points = backfill.len(),
                from = %report.earliest_inserted().unwrap_or(now),
                step = ?self.planner.step(),
                "planned backfill"
            );
        }

        IngestOutcome { report, backfill }
    }

    /// Rolling aggregate at the current instant.
    pub async fn current_value(&self) -> f64 {
        self.value_at_time(self.clock.now()).await
    }

    /// Rolling aggregate at `at`, which may lie in the past or future.
    ///
    /// Past instants only see events that survived pruning.
    pub async fn value_at_time(&self, at: DateTime<Utc>) -> f64 {
        let mut store = self.store.lock().await;
        store.prune(self.clock.now());
        Aggregator::new(&store).value_at_time(at)
    }

    /// Sum of raw quantities ingested in `(at - window, at]`.
    pub async fn windowed_total(&self, at: DateTime<Utc>, window: Duration) -> f64 {
        let mut store = self.store.lock().await;
        store.prune(self.clock.now());
        Aggregator::new(&store).windowed_total(at, window)
    }

    /// Rolling aggregate at `at`, plus the total over `window` ending at
    /// `at` and the rolling aggregate at `target` when given.
    pub async fn reading(
        &self,
        at: DateTime<Utc>,
        window: Option<Duration>,
        target: Option<DateTime<Utc>>,
    ) -> Reading {
        let mut store = self.store.lock().await;
        store.prune(self.clock.now());
        let aggregator = Aggregator::new(&store);

        Reading {
            events: store.len(),
            value: aggregator.value_at_time(at),
            total: window.map(|window| aggregator.windowed_total(at, window)),
            projected: target.map(|target| aggregator.value_at_time(target)),
        }
    }

    /// Every stored event with its age and contribution right now.
    pub async fn contributions(&self) -> Vec<Contribution> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        store.prune(now);
        Aggregator::new(&store).contributions(now)
    }

    /// Clone out the stored events.
    pub async fn events(&self) -> Vec<Event> {
        let mut store = self.store.lock().await;
        store.prune(self.clock.now());
        store.all()
    }

    /// Number of stored events after pruning.
    pub async fn len(&self) -> usize {
        let mut store = self.store.lock().await;
        store.prune(self.clock.now());
        store.len()
    }

    /// Whether the store is empty after pruning.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::clock::ManualClock;

    const MINUTE: Duration = Duration::from_secs(60);
    const HOUR: Duration = Duration::from_secs(3600);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn engine(clock: Arc<ManualClock>) -> DecayEngine {
        let params = DecayParameters::new(HOUR * 4, HOUR)
            .unwrap()
            .with_sanity_ceiling(200.0)
            .unwrap();
        DecayEngine::new(
            "dietary_caffeine",
            params,
            BackfillPlanner::new(MINUTE).unwrap(),
            clock,
        )
    }

    #[tokio::test]
    async fn current_value_follows_the_clock() {
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = engine(Arc::clone(&clock));
        engine.ingest(vec![Event::new(t0(), 100.0)]).await;

        clock.advance(HOUR * 4);
        let value = engine.current_value().await;
        assert!((value - 50.0).abs() < 1e-9, "got {value}");
    }

    #[tokio::test]
    async fn reads_prune_decayed_events() {
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = engine(Arc::clone(&clock));
        engine.ingest(vec![Event::new(t0(), 100.0)]).await;
        assert_eq!(engine.len().await, 1);

        clock.advance(HOUR * 30);
        assert!(engine.current_value().await < 1.0);
        assert!(engine.is_empty().await);

        // The pruned event is gone for past queries too.
        let past = engine.value_at_time(t0() + TimeDelta::hours(1)).await;
        assert!(past.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn ceiling_rejection_through_engine() {
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = engine(clock);
        let outcome = engine.ingest(vec![Event::new(t0(), 201.0)]).await;
        assert_eq!(outcome.report.new_count(), 0);
        assert!(outcome.backfill.is_empty());
        assert!(engine.events().await.is_empty());
    }

    #[tokio::test]
    async fn retroactive_batch_returns_backfill() {
        let clock = Arc::new(ManualClock::new(t0() + TimeDelta::hours(2)));
        let engine = engine(Arc::clone(&clock));

        let known: Vec<Event> = (0..2)
            .map(|i| Event::new(t0() + TimeDelta::minutes(60 + 30 * i), 40.0))
            .collect();
        let first = engine.ingest(known.clone()).await;
        assert!(first.backfill.is_empty());

        let mut batch = known;
        batch.extend((0..3).map(|i| Event::new(t0() + TimeDelta::minutes(10 * i), 20.0)));
        let outcome = engine.ingest(batch).await;

        assert_eq!(outcome.report.new_count(), 3);
        assert_eq!(outcome.report.batch_len(), 5);
        assert_eq!(outcome.backfill.first().unwrap().instant, t0());
        assert_eq!(outcome.backfill.last().unwrap().instant, t0() + TimeDelta::hours(2));
    }

    #[tokio::test]
    async fn projection_into_the_future() {
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = engine(Arc::clone(&clock));
        engine.ingest(vec![Event::new(t0(), 100.0)]).await;

        let bedtime = t0() + TimeDelta::hours(8);
        let projected = engine.value_at_time(bedtime).await;
        assert!((projected - 25.0).abs() < 1e-9, "got {projected}");
    }

    #[tokio::test]
    async fn reading_covers_value_total_and_projection() {
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = engine(Arc::clone(&clock));
        engine.ingest(vec![Event::new(t0(), 100.0)]).await;

        let at = t0() + TimeDelta::hours(4);
        let reading = engine
            .reading(at, Some(HOUR * 24), Some(t0() + TimeDelta::hours(8)))
            .await;
        assert_eq!(reading.events, 1);
        assert!((reading.value - 50.0).abs() < 1e-9, "got {}", reading.value);
        assert!((reading.total.unwrap() - 100.0).abs() < f64::EPSILON);
        assert!((reading.projected.unwrap() - 25.0).abs() < 1e-9);

        let bare = engine.reading(at, None, None).await;
        assert!((bare.value - reading.value).abs() < f64::EPSILON);
        assert!(bare.total.is_none());
        assert!(bare.projected.is_none());
    }

    #[tokio::test]
    async fn reading_of_empty_engine() {
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = engine(clock);
        let reading = engine.reading(t0(), Some(HOUR), None).await;
        assert_eq!(reading.events, 0);
        assert!(reading.value.abs() < f64::EPSILON);
        assert!(reading.total.unwrap().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn windowed_total_through_engine() {
        let clock = Arc::new(ManualClock::new(t0() + TimeDelta::hours(30)));
        let engine = engine(Arc::clone(&clock));
        let now = clock.now();
        engine
            .ingest(vec![
                Event::new(now - TimeDelta::hours(2), 10.0),
                Event::new(now - TimeDelta::hours(20), 150.0),
            ])
            .await;
        let total = engine.windowed_total(now, HOUR * 24).await;
        assert!((total - 160.0).abs() < f64::EPSILON, "got {total}");

        let contributions = engine.contributions().await;
        assert_eq!(contributions.len(), 2);
        assert!(contributions.iter().all(|c| c.age_ms > 0));
    }

    #[tokio::test]
    async fn concurrent_ingest_and_read() {
        let clock = Arc::new(ManualClock::new(t0() + TimeDelta::hours(1)));
        let engine = Arc::new(engine(Arc::clone(&clock)));

        let writer = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for i in 0..50 {
                    engine
                        .ingest(vec![Event::new(t0() + TimeDelta::seconds(i), 2.0)])
                        .await;
                }
            })
        };
        let reader = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for _ in 0..50 {
                    let value = engine.current_value().await;
                    assert!(value >= 0.0);
                }
            })
        };
        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(engine.len().await, 50);
    }
}
