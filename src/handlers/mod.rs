//! HTTP handlers for Wallet Sentinel

mod health;
mod metrics;

pub use health::*;
pub use metrics::*;

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::listener::SharedConnectionState;
use crate::metrics::SentinelMetrics;

/// Shared state for the HTTP surface
pub struct AppState {
    /// Poll engine, for store and last-cycle status
    pub engine: Arc<Engine>,
    pub metrics: Arc<SentinelMetrics>,
    /// `None` when the listener is disabled
    pub listener_state: Option<SharedConnectionState>,
    /// Application start time
    pub started_at: DateTime<Utc>,
}

/// Build the router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
