//! Integration tests for the Observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Engines run on a manual clock so values are exact.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use halflife_core::clock::ManualClock;
use halflife_core::config::HalflifeConfig;
use halflife_core::engine::DecayEngine;
use halflife_observer::router::build_router;
use halflife_observer::state::{AppState, TrackedQuantity};
use halflife_types::Event;
use serde_json::Value;
use tower::ServiceExt;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

/// Caffeine: 100mg at t0. Water: 16 at t0. Clock at t0 + 4h.
async fn make_test_state() -> Arc<AppState> {
    let clock = Arc::new(ManualClock::new(t0() + TimeDelta::hours(4)));
    let config = HalflifeConfig::default();

    let mut quantities = Vec::new();
    for quantity in config.quantities {
        let engine = Arc::new(DecayEngine::new(
            quantity.name.clone(),
            quantity.decay_parameters().unwrap(),
            quantity.backfill_planner().unwrap(),
            clock.clone(),
        ));
        let amount = if quantity.name == "dietary_caffeine" { 100.0 } else { 16.0 };
        engine.ingest(vec![Event::new(t0(), amount)]).await;
        quantities.push(TrackedQuantity {
            engine,
            config: quantity,
        });
    }

    Arc::new(AppState::new(quantities))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn get(path: &str) -> axum::response::Response {
    let router = build_router(make_test_state().await);
    router
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_index_returns_html() {
    let response = get("/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/html"));
    let body = body_to_string(response.into_body()).await;
    assert!(body.contains("dietary_caffeine"));
    assert!(body.contains("50.00"));
}

#[tokio::test]
async fn test_metrics_scrape() {
    let response = get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_to_string(response.into_body()).await;
    let ts = (t0() + TimeDelta::hours(4)).timestamp_millis();
    assert!(body.contains(&format!(
        r#"health_dietary_caffeine{{source="calculation", kind="rolling"}} 50 {ts}"#
    )));
    assert!(body.contains(&format!(
        r#"health_dietary_water{{source="calculation", kind="total"}} 16 {ts}"#
    )));
    assert!(body.contains("health_dietary_caffeine_bedtime_projection{source=\"calculation\"}"));
    assert!(body.ends_with('\n'));
}

#[tokio::test]
async fn test_list_quantities() {
    let response = get("/api/quantities").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["quantities"][0]["name"], "dietary_caffeine");
    assert_eq!(json["quantities"][0]["events"], 1);
    assert!(json["quantities"][0]["total"].is_null());
    assert_eq!(json["quantities"][1]["total"], 16.0);
}

#[tokio::test]
async fn test_get_quantity() {
    let response = get("/api/quantities/dietary_caffeine").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["metric_name"], "health_dietary_caffeine");
    let value = json["value"].as_f64().unwrap();
    assert!((value - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_get_quantity_not_found() {
    let response = get("/api/quantities/dietary_sugar").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
    assert!(json["error"].as_str().unwrap().contains("dietary_sugar"));
}

#[tokio::test]
async fn test_quantity_events() {
    let response = get("/api/quantities/dietary_caffeine/events").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["events"][0]["age_ms"], 4 * 3_600_000);
    assert_eq!(json["events"][0]["event"]["quantity"], 100.0);
}

#[tokio::test]
async fn test_value_at_future_instant() {
    let at = (t0() + TimeDelta::hours(8)).to_rfc3339();
    let path = format!("/api/quantities/dietary_caffeine/value?at={}", at.replace('+', "%2B"));
    let response = get(&path).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    let value = json["value"].as_f64().unwrap();
    assert!((value - 25.0).abs() < 1e-9, "got {value}");
}

#[tokio::test]
async fn test_value_defaults_to_now() {
    let response = get("/api/quantities/dietary_water/value").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    let value = json["value"].as_f64().unwrap();
    // 16 * 0.5^(4/12)
    assert!((value - 16.0 * 0.5_f64.powf(4.0 / 12.0)).abs() < 1e-9, "got {value}");
}

#[tokio::test]
async fn test_value_rejects_bad_instant() {
    let response = get("/api/quantities/dietary_water/value?at=noon").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
}
