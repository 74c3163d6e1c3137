//! Observer API server for the halflife collector.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`GET /metrics`** -- current rolling values in Prometheus text
//!   format, for scrapers that pull instead of being pushed to
//! - **REST endpoints** for inspecting each tracked quantity: summary,
//!   stored events with their contributions, and point-in-time queries
//! - **Minimal HTML status page** (`GET /`)
//!
//! Handlers read through the same `Arc<DecayEngine>`s the duty cycles
//! write to; see [`AppState`].
//!
//! [`AppState`]: state::AppState

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;

pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::spawn_observer;
pub use state::{AppState, TrackedQuantity};
