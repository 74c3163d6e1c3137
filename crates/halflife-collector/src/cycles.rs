//! Ingestion and export duty cycles.
//!
//! Each tracked quantity gets two independent periodic tasks sharing one
//! engine: the ingestion cycle polls the export files and upserts (pushing
//! a backfill when late data fills in history), and the export cycle
//! pushes the current values. Both stop as soon as the shutdown watch
//! flips, dropping whatever tick was in flight.

use std::future::Future;
use std::time::Duration;

use chrono::Local;
use halflife_core::backfill::BackfillPlanner;
use halflife_core::engine::IngestOutcome;
use halflife_export::MetricSink;
use halflife_export::series::{backfill_batch, read_quantity, reading_points};
use halflife_ingest::IntradaySource;
use halflife_observer::TrackedQuantity;
use halflife_types::{ExportBatch, MetricKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Resolve once `shutdown` reads `true` or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Run `tick` every `period` until shutdown. The first tick fires
/// immediately. A tick still running at shutdown is dropped.
pub async fn run_every<F, Fut>(period: Duration, mut shutdown: watch::Receiver<bool>, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = stopped(&mut shutdown) => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            () = stopped(&mut shutdown) => break,
            () = tick() => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// One ingestion tick: poll, upsert, and push any backfill.
///
/// Returns `None` when the files held no events for this quantity.
pub async fn ingest_tick(
    quantity: &TrackedQuantity,
    source: &IntradaySource,
    sink: &MetricSink,
) -> Option<IngestOutcome> {
    let engine = &quantity.engine;
    let today = engine.now().with_timezone(&Local).date_naive();
    let snapshot = source.poll(today).await;

    let events = snapshot.events(&MetricKind::from_name(&quantity.config.name));
    if events.is_empty() {
        debug!(quantity = %quantity.config.name, "no events in export files");
        return None;
    }

    let outcome = engine.ingest(events).await;

    if !outcome.backfill.is_empty() {
        let batch = backfill_batch(&quantity.config.metric_name, &outcome.backfill);
        match sink.push(&batch).await {
            Ok(()) => info!(
                quantity = %quantity.config.name,
                points = batch.len(),
                sink = sink.name(),
                "pushed backfill"
            ),
            Err(e) => warn!(error = %e, quantity = %quantity.config.name, "backfill push failed"),
        }
    }

    Some(outcome)
}

/// Spawn the ingestion cycle for one quantity.
pub fn spawn_ingest_cycle(
    quantity: TrackedQuantity,
    source: IntradaySource,
    sink: MetricSink,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = quantity.config.poll_interval();
        info!(
            quantity = %quantity.config.name,
            poll_interval_ms = quantity.config.poll_interval_ms,
            "ingestion cycle started"
        );
        run_every(period, shutdown, || async {
            ingest_tick(&quantity, &source, &sink).await;
        })
        .await;
        info!(quantity = %quantity.config.name, "ingestion cycle stopped");
    })
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// One export tick: push the current values, timestamped at the tick
/// boundary. Sends nothing while the store is empty.
///
/// Returns the batch that was pushed, if any.
pub async fn export_tick(
    quantity: &TrackedQuantity,
    grid: &BackfillPlanner,
    sink: &MetricSink,
) -> Option<ExportBatch> {
    let engine = &quantity.engine;
    let at = grid.floor(engine.now());
    let reading = read_quantity(engine, &quantity.config, at).await;
    if reading.events == 0 {
        debug!(quantity = %quantity.config.name, "store empty, nothing to export");
        return None;
    }

    let points = reading_points(&quantity.config, &reading, at);
    let batch = ExportBatch::new(quantity.config.metric_name.clone(), points);

    if let Some(rolling) = batch.points.first() {
        info!(
            quantity = %quantity.config.name,
            value = rolling.value,
            at = %at,
            "exporting current value"
        );
    }
    if let Err(e) = sink.push(&batch).await {
        warn!(error = %e, quantity = %quantity.config.name, "export push failed");
    }

    Some(batch)
}

/// Spawn the export cycle for one quantity. `grid` floors timestamps to
/// the tick interval.
pub fn spawn_export_cycle(
    quantity: TrackedQuantity,
    grid: BackfillPlanner,
    sink: MetricSink,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = quantity.config.tick_interval();
        info!(
            quantity = %quantity.config.name,
            tick_interval_ms = quantity.config.tick_interval_ms,
            "export cycle started"
        );
        run_every(period, shutdown, || async {
            export_tick(&quantity, &grid, &sink).await;
        })
        .await;
        info!(quantity = %quantity.config.name, "export cycle stopped");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use halflife_core::clock::{Clock, ManualClock};
    use halflife_core::config::HalflifeConfig;
    use halflife_core::engine::DecayEngine;
    use halflife_export::MemorySink;
    use halflife_types::Event;
    use tempfile::TempDir;

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    /// Noon UTC keeps the local date stable for any host offset within ±11h.
    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn water(clock: Arc<ManualClock>) -> TrackedQuantity {
        let config = HalflifeConfig::default()
            .quantities
            .into_iter()
            .find(|q| q.name == "dietary_water")
            .unwrap();
        let engine = DecayEngine::new(
            config.name.clone(),
            config.decay_parameters().unwrap(),
            config.backfill_planner().unwrap(),
            clock,
        );
        TrackedQuantity {
            engine: Arc::new(engine),
            config,
        }
    }

    fn write_today(dir: &TempDir, clock: &ManualClock, records: &[(DateTime<Utc>, u32)]) {
        let source = IntradaySource::new(dir.path(), "Intraday", 1);
        let path = source.path_for(clock.now().with_timezone(&Local).date_naive());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let data: Vec<String> = records
            .iter()
            .map(|(at, qty)| format!(r#"{{"qty":{qty},"date":"{}"}}"#, at.to_rfc3339()))
            .collect();
        let body = format!(
            r#"{{"data":{{"metrics":[{{"name":"dietary_water","units":"fl_oz_us","data":[{}]}}]}}}}"#,
            data.join(",")
        );
        std::fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn export_tick_skips_empty_store() {
        let clock = Arc::new(ManualClock::new(t0()));
        let quantity = water(clock);
        let memory = MemorySink::new();
        let grid = BackfillPlanner::new(MINUTE).unwrap();

        let pushed = export_tick(&quantity, &grid, &MetricSink::Memory(memory.clone())).await;
        assert!(pushed.is_none());
        assert!(memory.batches().await.is_empty());
    }

    #[tokio::test]
    async fn export_tick_floors_timestamp_and_sends_total() {
        let clock = Arc::new(ManualClock::new(t0() + TimeDelta::seconds(42)));
        let quantity = water(Arc::clone(&clock));
        quantity.engine.ingest(vec![Event::new(t0() - TimeDelta::hours(2), 8.0)]).await;

        let memory = MemorySink::new();
        let grid = BackfillPlanner::new(MINUTE).unwrap();
        export_tick(&quantity, &grid, &MetricSink::Memory(memory.clone())).await;

        let batches = memory.take().await;
        assert_eq!(batches.len(), 1);
        let points = &batches[0].points;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp(), Some(t0()));
        assert!((points[1].value - 8.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn ingest_tick_pushes_backfill_for_late_data() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let quantity = water(Arc::clone(&clock));
        let source = IntradaySource::new(dir.path(), "Intraday", 1);
        let memory = MemorySink::new();
        let sink = MetricSink::Memory(memory.clone());

        let seen = t0() - TimeDelta::hours(1);
        write_today(&dir, &clock, &[(seen, 8)]);
        let first = ingest_tick(&quantity, &source, &sink).await.unwrap();
        assert_eq!(first.report.new_count(), 1);
        assert!(memory.batches().await.is_empty());

        let late = t0() - TimeDelta::hours(2);
        write_today(&dir, &clock, &[(seen, 8), (late, 12)]);
        let second = ingest_tick(&quantity, &source, &sink).await.unwrap();
        assert_eq!(second.report.new_count(), 1);

        let batches = memory.take().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].points.first().unwrap().timestamp(), Some(late));
        assert_eq!(batches[0].points.len(), 121);
    }

    #[tokio::test]
    async fn ingest_tick_without_file_is_quiet() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let quantity = water(clock);
        let source = IntradaySource::new(dir.path(), "Intraday", 1);
        let sink = MetricSink::Memory(MemorySink::new());

        assert!(ingest_tick(&quantity, &source, &sink).await.is_none());
        assert!(quantity.engine.is_empty().await);
    }

    #[tokio::test]
    async fn run_every_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ticks);
        let task = tokio::spawn(run_every(Duration::from_millis(5), rx, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(ticks.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn run_every_drops_in_flight_tick() {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run_every(Duration::from_millis(5), rx, || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
