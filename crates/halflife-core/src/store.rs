//! Deduplicating, self-pruning event store.
//!
//! Events are keyed by timestamp. Re-ingesting a timestamp overwrites the
//! stored quantity (last write wins, never summed). After every upsert
//! the store prunes events whose contribution has fallen below the prune
//! threshold, so memory stays bounded as long as the store is queried at
//! least as often as events decay away.
//!
//! Pruning is destructive: a later query for a past instant that would
//! have included a pruned event silently omits it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use halflife_types::Event;
use tracing::debug;

use crate::decay::DecayFunction;

/// What a single [`EventStore::upsert`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Number of events in the submitted batch.
    batch_len: usize,
    /// Timestamps that were not present before this call, in first-seen order.
    inserted: Vec<DateTime<Utc>>,
    /// Events that replaced an existing timestamp.
    overwritten: usize,
    /// Events rejected by the sanity ceiling or as malformed.
    discarded: usize,
    /// Events removed by the post-upsert prune.
    pruned: usize,
}

impl UpsertReport {
    /// Count of keys that were not previously present.
    pub fn new_count(&self) -> usize {
        self.inserted.len()
    }

    /// Number of events submitted, including discarded ones.
    pub const fn batch_len(&self) -> usize {
        self.batch_len
    }

    /// Timestamps of the newly-inserted events.
    pub fn inserted(&self) -> &[DateTime<Utc>] {
        &self.inserted
    }

    /// The earliest newly-inserted timestamp, if any.
    pub fn earliest_inserted(&self) -> Option<DateTime<Utc>> {
        self.inserted.iter().min().copied()
    }

    /// Number of events that overwrote an existing timestamp.
    pub const fn overwritten(&self) -> usize {
        self.overwritten
    }

    /// Number of events discarded before insertion.
    pub const fn discarded(&self) -> usize {
        self.discarded
    }

    /// Number of events pruned right after the upsert.
    pub const fn pruned(&self) -> usize {
        self.pruned
    }

    /// Whether the batch mixed new and already-seen timestamps.
    ///
    /// A purely new batch is a normal forward tick; a partially new one
    /// means history was filled in and previously exported values are stale.
    pub fn is_retroactive(&self) -> bool {
        let new_count = self.new_count();
        new_count > 0 && new_count != self.batch_len
    }
}

/// Set of ingestion events for one tracked quantity.
#[derive(Debug, Clone)]
pub struct EventStore {
    decay: DecayFunction,
    events: BTreeMap<DateTime<Utc>, Event>,
}

impl EventStore {
    /// Create an empty store evaluating contributions with `decay`.
    pub const fn new(decay: DecayFunction) -> Self {
        Self {
            decay,
            events: BTreeMap::new(),
        }
    }

    /// The decay function used for pruning.
    pub const fn decay(&self) -> &DecayFunction {
        &self.decay
    }

    /// Insert or overwrite a batch of events, then prune at `now`.
    ///
    /// Events above the sanity ceiling, or with a negative or non-finite
    /// quantity, are discarded and never counted as new.
    pub fn upsert<I>(&mut self, events: I, now: DateTime<Utc>) -> UpsertReport
    where
        I: IntoIterator<Item = Event>,
    {
        let ceiling = self.decay.params().sanity_ceiling();
        let mut report = UpsertReport::default();

        for event in events {
            report.batch_len = report.batch_len.saturating_add(1);

            if !event.quantity.is_finite() || event.quantity < 0.0 || event.quantity > ceiling {
                debug!(
                    timestamp = %event.timestamp,
                    quantity = event.quantity,
                    ceiling,
                    "discarding event outside sane range"
                );
                report.discarded = report.discarded.saturating_add(1);
                continue;
            }

            let timestamp = event.timestamp;
            if self.events.insert(timestamp, event).is_some() {
                report.overwritten = report.overwritten.saturating_add(1);
            } else {
                report.inserted.push(timestamp);
            }
        }

        report.pruned = self.prune(now);
        report
    }

    /// Remove every event whose contribution at `now` is below the prune
    /// threshold. Returns the number removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.events.len();
        let decay = self.decay;
        self.events
            .retain(|_, event| !decay.is_negligible(event, now));
        let removed = before.saturating_sub(self.events.len());
        if removed > 0 {
            debug!(removed, remaining = self.events.len(), "pruned negligible events");
        }
        removed
    }

    /// Clone out every stored event, ordered by timestamp.
    pub fn all(&self) -> Vec<Event> {
        self.events.values().cloned().collect()
    }

    /// Iterate the stored events in timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    /// Look up the event stored at `timestamp`.
    pub fn get(&self, timestamp: &DateTime<Utc>) -> Option<&Event> {
        self.events.get(timestamp)
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the store holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
