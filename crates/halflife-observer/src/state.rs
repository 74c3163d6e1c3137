//! Shared application state for the Observer API server.
//!
//! The observer holds the same `Arc<DecayEngine>`s the duty cycles use;
//! there is no separate snapshot. Every read goes through the engine's
//! lock, so the API always sees a consistent, freshly pruned store.

use std::collections::BTreeMap;
use std::sync::Arc;

use halflife_core::config::QuantityConfig;
use halflife_core::engine::DecayEngine;

/// One tracked quantity as seen by the observer.
#[derive(Debug, Clone)]
pub struct TrackedQuantity {
    /// The live engine.
    pub engine: Arc<DecayEngine>,
    /// The quantity's configuration (series names, window, projection).
    pub config: QuantityConfig,
}

/// Shared state for all HTTP handlers.
#[derive(Debug, Default)]
pub struct AppState {
    quantities: BTreeMap<String, TrackedQuantity>,
}

impl AppState {
    /// Create state over the given quantities, keyed by their names.
    pub fn new(quantities: impl IntoIterator<Item = TrackedQuantity>) -> Self {
        Self {
            quantities: quantities
                .into_iter()
                .map(|q| (q.config.name.clone(), q))
                .collect(),
        }
    }

    /// Look up a quantity by name.
    pub fn get(&self, name: &str) -> Option<&TrackedQuantity> {
        self.quantities.get(name)
    }

    /// All quantities, ordered by name.
    pub fn quantities(&self) -> impl Iterator<Item = &TrackedQuantity> {
        self.quantities.values()
    }

    /// Number of tracked quantities.
    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }
}
