//! Pass-through processors for metrics that are forwarded without decay.
//!
//! Heart rate is forwarded as its per-sample average. Step count and
//! walking/running distance arrive as increments and are forwarded as a
//! running sum over the polled files. Every point carries the recording
//! `source`, or `unknown`.

use std::sync::Arc;

use chrono::Local;
use halflife_core::clock::Clock;
use halflife_export::MetricSink;
use halflife_ingest::{IntradaySource, Metric, MetricRecords, Snapshot};
use halflife_types::{ExportBatch, ExportPoint, MetricKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cycles::run_every;

/// `source` label value when a record does not name one.
const UNKNOWN_SOURCE: &str = "unknown";

/// How a processor turns records into values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Heart rate `Avg` per sample.
    Average,
    /// Running sum of `qty` in record order.
    CumulativeSum,
}

/// Maps one HAE metric to one exported series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processor {
    /// The metric consumed.
    pub kind: MetricKind,
    /// The series produced.
    pub metric_name: &'static str,
    /// How values are derived.
    pub transform: Transform,
}

/// The built-in processors.
pub fn processors() -> Vec<Processor> {
    vec![
        Processor {
            kind: MetricKind::HeartRate,
            metric_name: "health_heart_rate",
            transform: Transform::Average,
        },
        Processor {
            kind: MetricKind::StepCount,
            metric_name: "health_step_count",
            transform: Transform::CumulativeSum,
        },
        Processor {
            kind: MetricKind::WalkingRunningDistance,
            metric_name: "health_walking_running_distance",
            transform: Transform::CumulativeSum,
        },
    ]
}

impl Processor {
    /// Turn `metric` into a batch. Records of the wrong schema yield nothing.
    pub fn process(&self, metric: &Metric) -> ExportBatch {
        let points = match (self.transform, &metric.records) {
            (Transform::Average, MetricRecords::HeartRate(records)) => records
                .iter()
                .map(|(at, r)| self.point(r.avg, *at, r.source.as_deref()))
                .collect(),
            (Transform::CumulativeSum, MetricRecords::Quantity(records)) => {
                let mut sum = 0.0;
                records
                    .iter()
                    .map(|(at, r)| {
                        sum += r.qty;
                        self.point(sum, *at, r.source.as_deref())
                    })
                    .collect()
            }
            _ => Vec::new(),
        };
        ExportBatch::new(self.metric_name, points)
    }

    /// Batches for every processor whose metric is in `snapshot`.
    pub fn process_snapshot(processors: &[Self], snapshot: &Snapshot) -> Vec<ExportBatch> {
        processors
            .iter()
            .filter_map(|p| snapshot.get(&p.kind).map(|metric| p.process(metric)))
            .filter(|batch| !batch.is_empty())
            .collect()
    }

    fn point(&self, value: f64, at: chrono::DateTime<chrono::Utc>, source: Option<&str>) -> ExportPoint {
        ExportPoint::new(self.metric_name, value, at)
            .with_label("source", source.unwrap_or(UNKNOWN_SOURCE))
    }
}

/// Spawn the pass-through cycle: poll the files and push one batch per
/// processor each interval.
pub fn spawn_passthrough_cycle(
    period: std::time::Duration,
    source: IntradaySource,
    sink: MetricSink,
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let processors = processors();
        info!(processors = processors.len(), "pass-through cycle started");
        run_every(period, shutdown, || async {
            let today = clock.now().with_timezone(&Local).date_naive();
            let snapshot = source.poll(today).await;
            for batch in Processor::process_snapshot(&processors, &snapshot) {
                match sink.push(&batch).await {
                    Ok(()) => info!(
                        metric = %batch.metric_name,
                        points = batch.len(),
                        "pushed pass-through batch"
                    ),
                    Err(e) => warn!(error = %e, metric = %batch.metric_name, "pass-through push failed"),
                }
            }
        })
        .await;
        info!("pass-through cycle stopped");
    })
}
