//! REST API endpoint handlers for the Observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/metrics` | Current samples in Prometheus text format |
//! | `GET` | `/api/quantities` | Summary of every tracked quantity |
//! | `GET` | `/api/quantities/{name}` | Summary of one quantity |
//! | `GET` | `/api/quantities/{name}/events` | Stored events with contributions |
//! | `GET` | `/api/quantities/{name}/value` | Point query (`?at=<RFC 3339>`) |

use std::fmt::Write as _;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};
use chrono::{DateTime, Utc};
use halflife_export::format_body;
use halflife_export::series::quantity_points;

use crate::error::ObserverError;
use crate::state::{AppState, TrackedQuantity};

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/quantities/{name}/value`.
#[derive(Debug, serde::Deserialize)]
pub struct ValueQuery {
    /// RFC 3339 instant; defaults to now.
    pub at: Option<String>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page listing every quantity's current value.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut rows = String::new();
    for quantity in state.quantities() {
        let engine = &quantity.engine;
        let reading = engine.reading(engine.now(), None, None).await;
        let (value, events) = (reading.value, reading.events);
        let name = &quantity.config.name;
        let _ = write!(
            rows,
            r#"
        <tr>
            <td><a href="/api/quantities/{name}">{name}</a></td>
            <td>{metric}</td>
            <td class="value">{value:.2}</td>
            <td>{events}</td>
        </tr>"#,
            metric = quantity.config.metric_name,
        );
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Halflife Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        table {{ border-collapse: collapse; width: 100%; }}
        td, th {{ border-bottom: 1px solid #30363d; padding: 0.4rem; text-align: left; }}
        .value {{ color: #7ee787; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Halflife Observer</h1>
    <table>
        <tr><th>Quantity</th><th>Series</th><th>Current</th><th>Events</th></tr>{rows}
    </table>
    <p><a href="/metrics">/metrics</a> -- Prometheus text</p>
    <p><a href="/api/quantities">/api/quantities</a> -- JSON summary</p>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /metrics -- Prometheus text
// ---------------------------------------------------------------------------

/// Current rolling values (plus totals and projections) of every quantity.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut points = Vec::new();
    for quantity in state.quantities() {
        let now = quantity.engine.now();
        points.extend(quantity_points(&quantity.engine, &quantity.config, now).await);
    }

    let mut body = format_body(&points);
    if !body.is_empty() {
        body.push('\n');
    }
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// ---------------------------------------------------------------------------
// GET /api/quantities
// ---------------------------------------------------------------------------

/// Summaries of every tracked quantity.
pub async fn list_quantities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut quantities = Vec::with_capacity(state.len());
    for quantity in state.quantities() {
        quantities.push(summary(quantity).await);
    }

    Json(serde_json::json!({
        "count": quantities.len(),
        "quantities": quantities,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/quantities/{name}
// ---------------------------------------------------------------------------

/// Summary of a single quantity.
pub async fn get_quantity(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let quantity = lookup(&state, &name)?;
    Ok(Json(summary(quantity).await))
}

// ---------------------------------------------------------------------------
// GET /api/quantities/{name}/events
// ---------------------------------------------------------------------------

/// Stored events with their age and current contribution.
pub async fn quantity_events(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let quantity = lookup(&state, &name)?;
    let contributions = quantity.engine.contributions().await;

    Ok(Json(serde_json::json!({
        "name": name,
        "count": contributions.len(),
        "events": contributions,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/quantities/{name}/value
// ---------------------------------------------------------------------------

/// Rolling value at an arbitrary instant (past or future).
pub async fn quantity_value(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<ValueQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let quantity = lookup(&state, &name)?;
    let at = match params.at.as_deref() {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ObserverError::InvalidQuery(format!("invalid instant {raw:?}: {e}")))?,
        None => quantity.engine.now(),
    };

    let value = quantity.engine.value_at_time(at).await;
    Ok(Json(serde_json::json!({
        "name": name,
        "at": at,
        "value": value,
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lookup<'a>(state: &'a AppState, name: &str) -> Result<&'a TrackedQuantity, ObserverError> {
    state
        .get(name)
        .ok_or_else(|| ObserverError::NotFound(format!("quantity {name}")))
}

async fn summary(quantity: &TrackedQuantity) -> serde_json::Value {
    let engine = &quantity.engine;
    let config = &quantity.config;
    let now = engine.now();

    let reading = engine.reading(now, config.total_window(), None).await;

    serde_json::json!({
        "name": config.name,
        "metric_name": config.metric_name,
        "value": reading.value,
        "total": reading.total,
        "total_window_ms": config.total_window_ms,
        "events": reading.events,
        "half_life_ms": config.half_life_ms,
        "ingestion_delay_ms": config.ingestion_delay_ms,
        "at": now,
    })
}
