//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::AppState;
use crate::engine::CycleReport;
use crate::listener::ConnectionState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    /// Uptime in seconds
    pub uptime_seconds: i64,
    /// Wallets currently tracked
    pub tracked_wallets: usize,
    /// Configured chain names, in alert order
    pub chains: Vec<String>,
    /// Storage backend in use
    pub storage: &'static str,
    /// Most recent completed poll cycle
    pub last_cycle: Option<CycleReport>,
    /// Listener connection state, absent when the listener is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener: Option<ConnectionState>,
}

/// Health status enum
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Listener reconnecting or the last cycle had failures
    Degraded,
    /// Listener gave up
    Unhealthy,
}

fn overall_status(listener: Option<ConnectionState>, last_cycle: Option<&CycleReport>) -> HealthStatus {
    match listener {
        Some(ConnectionState::Failed) => return HealthStatus::Unhealthy,
        Some(ConnectionState::Reconnecting { .. }) => return HealthStatus::Degraded,
        _ => {}
    }

    match last_cycle {
        Some(report) if report.commit_failures > 0 => HealthStatus::Degraded,
        Some(report) if report.wallets_checked > 0 && report.skipped_commits == report.wallets_checked => {
            // every explorer failed for every wallet
            HealthStatus::Degraded
        }
        _ => HealthStatus::Healthy,
    }
}

/// Health check handler
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let engine = &state.engine;

    let listener = state.listener_state.as_ref().map(|s| *s.read());
    let last_cycle = engine.last_report();
    let status = overall_status(listener, last_cycle.as_ref());

    let status_code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        uptime_seconds: uptime,
        tracked_wallets: engine.store().len().await,
        chains: engine.registry().names().map(str::to_string).collect(),
        storage: engine.store().backend_name(),
        last_cycle,
        listener,
    };

    (status_code, Json(response))
}
