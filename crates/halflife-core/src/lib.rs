//! Decaying value engine for the halflife collector.
//!
//! This crate owns everything with real numeric content: the decay model,
//! the deduplicating event store, point and window aggregation, and the
//! planner that recomputes history when late data arrives.
//!
//! # Modules
//!
//! - [`decay`] -- [`DecayParameters`] and the pure [`DecayFunction`].
//! - [`store`] -- [`EventStore`], keyed by timestamp, with pruning.
//! - [`aggregator`] -- Decayed point values and undecayed window totals.
//! - [`backfill`] -- [`BackfillPlanner`] for retroactive batches.
//! - [`engine`] -- [`DecayEngine`], one locked store per tracked quantity.
//! - [`clock`] -- Injectable wall clock.
//! - [`config`] -- YAML configuration loading into typed structs.
//!
//! [`DecayParameters`]: decay::DecayParameters
//! [`DecayFunction`]: decay::DecayFunction
//! [`EventStore`]: store::EventStore
//! [`BackfillPlanner`]: backfill::BackfillPlanner
//! [`DecayEngine`]: engine::DecayEngine

pub mod aggregator;
pub mod backfill;
pub mod clock;
pub mod config;
pub mod decay;
pub mod engine;
pub mod store;
