//! Admin endpoints: /health, /stats

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    tracing::debug!("health check requested");
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Server statistics response
#[derive(Serialize)]
pub struct StatsResponse {
    /// Server uptime in seconds
    pub uptime_secs: u64,
    /// Deployment environment name
    pub environment: String,
    /// Whether account management envelopes can be opened
    pub amc_enabled: bool,
    /// Whether reverification envelopes can be opened
    pub ipv_enabled: bool,
    /// Server version
    pub version: &'static str,
}

/// Server statistics endpoint
///
/// GET /stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    tracing::debug!("server stats requested");
    Json(StatsResponse {
        uptime_secs: state.uptime_secs(),
        environment: state.config.environment.name().to_string(),
        amc_enabled: state.amc_decryption.is_some(),
        ipv_enabled: state.ipv_decryption.is_some(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
