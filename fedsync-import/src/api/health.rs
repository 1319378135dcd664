//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::models::ImportState;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "stopping" once shutdown began
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub import_enabled: bool,
    pub import_state: ImportState,
    /// Error of the last failed run, if the last run failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let import_status = state.coordinator.get_status();
    let last_error = Some(import_status.last_error).filter(|e| !e.is_empty());

    let status = if state.coordinator.is_stopped() {
        "stopping"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: crate::config::MODULE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        import_enabled: state.coordinator.config().enabled,
        import_state: import_status.state,
        last_error,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
