//! Daily-file source for Health Auto Export automations.
//!
//! HAE writes one file per local calendar day under
//! `{root}/{automation}/HealthAutoExport-{YYYY-MM-DD}.json` and rewrites it
//! as the day goes on. A poll reads the most recent `lookback_days` files
//! and merges same-named metrics, so samples that landed in yesterday's
//! file shortly before midnight are still seen after the date rolls over.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use halflife_core::config::IngestConfig;
use halflife_types::{Event, MetricKind};
use tracing::{debug, warn};

use crate::document::{merge_metrics, parse_document};
use crate::error::IngestError;
use crate::record::Metric;

/// Metrics gathered by one poll, merged by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    metrics: BTreeMap<MetricKind, Metric>,
}

impl Snapshot {
    /// Build a snapshot from parsed metrics, merging repeated names.
    pub fn new(metrics: impl IntoIterator<Item = Metric>) -> Self {
        Self {
            metrics: merge_metrics(metrics),
        }
    }

    /// The merged metric of `kind`, if any file carried it.
    pub fn get(&self, kind: &MetricKind) -> Option<&Metric> {
        self.metrics.get(kind)
    }

    /// Quantity events for `kind`; empty if absent.
    pub fn events(&self, kind: &MetricKind) -> Vec<Event> {
        self.get(kind).map(Metric::events).unwrap_or_default()
    }

    /// Every metric in the snapshot.
    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.values()
    }

    /// Whether no file contributed any metric.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Reads HAE daily files for one automation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntradaySource {
    root: PathBuf,
    automation: String,
    lookback_days: u32,
}

impl IntradaySource {
    /// Create a source. A `lookback_days` of zero is treated as one.
    pub fn new(root: impl Into<PathBuf>, automation: impl Into<String>, lookback_days: u32) -> Self {
        Self {
            root: root.into(),
            automation: automation.into(),
            lookback_days: lookback_days.max(1),
        }
    }

    /// Create a source from the `ingest` config section.
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(&config.root, &config.automation, config.lookback_days)
    }

    /// The file HAE writes for `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(&self.automation)
            .join(format!("HealthAutoExport-{}.json", date.format("%Y-%m-%d")))
    }

    /// The dates read for a poll on `today`, newest first.
    pub fn dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        (0..self.lookback_days)
            .filter_map(|back| today.checked_sub_days(Days::new(u64::from(back))))
            .collect()
    }

    /// Read and merge the files for the dates around `today`.
    ///
    /// A missing, unreadable, or malformed file is logged and contributes
    /// nothing; the poll never fails as a whole.
    pub async fn poll(&self, today: NaiveDate) -> Snapshot {
        let mut metrics = Vec::new();

        for date in self.dates(today) {
            let path = self.path_for(date);
            match read_file(&path).await {
                Ok(Some(parsed)) => {
                    debug!(
                        path = %path.display(),
                        metrics = parsed.len(),
                        "read export file"
                    );
                    metrics.extend(parsed);
                }
                Ok(None) => debug!(path = %path.display(), "export file not present"),
                Err(e) => warn!(error = %e, path = %path.display(), "skipping export file"),
            }
        }

        Snapshot::new(metrics)
    }
}

/// Read and parse one file. `Ok(None)` if it does not exist.
async fn read_file(path: &Path) -> Result<Option<Vec<Metric>>, IngestError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(IngestError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok(Some(parse_document(&contents)?.metrics))
}
