//! API Integration Tests
//!
//! Tests the HTTP surface for:
//! - Health check status and body
//! - Health degradation when the listener gives up
//! - Prometheus scrape output
//!
//! Uses tower's `oneshot` against the real router.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use crate::common::*;
use wallet_sentinel::handlers::{router, AppState};
use wallet_sentinel::listener::ConnectionState;

fn app_state(h: &Harness, listener: Option<ConnectionState>) -> Arc<AppState> {
    Arc::new(AppState {
        engine: h.engine.clone(),
        metrics: h.metrics.clone(),
        listener_state: listener.map(|s| Arc::new(RwLock::new(s))),
        started_at: Utc::now(),
    })
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_health_reports_store_and_chains() {
    let h = Harness::new(&["Eth", "Base"]).await;
    h.track(WALLET_A, &[]).await;
    h.fetcher.set(WALLET_A, "Eth", 2);
    h.fetcher.set(WALLET_A, "Base", 0);
    h.engine.run_cycle().await;

    let (status, body) = get(app_state(&h, Some(ConnectionState::Connected)), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["tracked_wallets"], 1);
    assert_eq!(json["chains"], serde_json::json!(["Eth", "Base"]));
    assert_eq!(json["storage"], "memory");
    assert_eq!(json["last_cycle"]["alerts_sent"], 1);
    assert_eq!(json["listener"]["state"], "connected");
}

#[tokio::test]
async fn test_health_without_listener() {
    let h = Harness::new(&["Eth"]).await;

    let (status, body) = get(app_state(&h, None), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json.get("listener").is_none());
    assert!(json["last_cycle"].is_null());
}

#[tokio::test]
async fn test_health_reconnecting_is_degraded() {
    let h = Harness::new(&["Eth"]).await;

    let (status, body) = get(
        app_state(&h, Some(ConnectionState::Reconnecting { attempt: 2 })),
        "/health",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["listener"]["attempt"], 2);
}

#[tokio::test]
async fn test_health_failed_listener_is_unavailable() {
    let h = Harness::new(&["Eth"]).await;

    let (status, body) = get(app_state(&h, Some(ConnectionState::Failed)), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let h = Harness::new(&["Eth"]).await;
    h.track(WALLET_A, &[]).await;
    h.engine.run_cycle().await;

    let (status, body) = get(app_state(&h, None), "/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("sentinel_cycles_total 1"));
    assert!(text.contains(r#"sentinel_fetch_failures_total{chain="Eth",kind="status"} 1"#));
}

#[tokio::test]
async fn test_unknown_route() {
    let h = Harness::new(&["Eth"]).await;
    let (status, _) = get(app_state(&h, None), "/wallets").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
