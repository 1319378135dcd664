//! Import administration API handlers
//!
//! GET /import/status, GET /import/logs, POST /import/trigger,
//! GET /import/test-connection

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiResult,
    models::{ImportLogEntry, ImportState, ImportStatus},
    AppState,
};

/// Default number of entries returned by GET /import/logs
pub const DEFAULT_LOG_LIMIT: usize = 50;

/// GET /import/logs query parameters
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// 0 returns every retained entry
    pub limit: Option<usize>,
}

/// GET /import/logs response
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub entries: Vec<ImportLogEntry>,
    pub capacity: usize,
}

/// POST /import/trigger response
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub run_id: Uuid,
    pub state: ImportState,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// GET /import/test-connection response
#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub reachable: bool,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

/// GET /import/status
pub async fn get_import_status(State(state): State<AppState>) -> Json<ImportStatus> {
    Json(state.coordinator.get_status())
}

/// GET /import/logs?limit=N
///
/// Most recent entries first. A malformed `limit` is a 400 with the
/// usual error body.
pub async fn get_import_logs(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> ApiResult<Json<LogsResponse>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Ok(Json(LogsResponse {
        entries: state.coordinator.get_logs(limit),
        capacity: state.coordinator.tracker().log_capacity(),
    }))
}

/// POST /import/trigger
///
/// Starts a manual run. 202 Accepted, 409 when a run is in progress,
/// 503 when import is disabled or the service is shutting down.
pub async fn trigger_import(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let run_id = state.coordinator.trigger_manual()?;
    let status = state.coordinator.get_status();

    tracing::info!(run_id = %run_id, "Manual import triggered");

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            run_id,
            state: status.state,
            started_at: status.start_time.unwrap_or_else(chrono::Utc::now),
        }),
    ))
}

/// GET /import/test-connection
///
/// 200 when the remote source is reachable, 502 otherwise.
pub async fn test_connection(State(state): State<AppState>) -> ApiResult<Json<ConnectionResponse>> {
    state.coordinator.test_connection().await?;
    Ok(Json(ConnectionResponse {
        reachable: true,
        checked_at: chrono::Utc::now(),
    }))
}

/// Build import administration routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/import/status", get(get_import_status))
        .route("/import/logs", get(get_import_logs))
        .route("/import/trigger", post(trigger_import))
        .route("/import/test-connection", get(test_connection))
}
