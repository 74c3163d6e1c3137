//! Axum router construction for the Observer API.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /metrics` -- Prometheus text scrape
/// - `GET /api/quantities` -- list quantities
/// - `GET /api/quantities/{name}` -- single quantity
/// - `GET /api/quantities/{name}/events` -- stored events
/// - `GET /api/quantities/{name}/value` -- point query
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/metrics", get(handlers::metrics))
        .route("/api/quantities", get(handlers::list_quantities))
        .route("/api/quantities/{name}", get(handlers::get_quantity))
        .route("/api/quantities/{name}/events", get(handlers::quantity_events))
        .route("/api/quantities/{name}/value", get(handlers::quantity_value))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
