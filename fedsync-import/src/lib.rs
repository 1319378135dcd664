//! fedsync-import library interface
//!
//! Keeps the local federation databases synchronized with the remote
//! authoritative source. Exposed as a library for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, SyncError};

use axum::Router;
use chrono::{DateTime, Utc};
use services::{InFlightGauge, SyncCoordinator};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SyncCoordinator>,
    /// In-flight request counter, also the coordinator's load sensor
    pub gauge: Arc<InFlightGauge>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(coordinator: Arc<SyncCoordinator>, gauge: Arc<InFlightGauge>) -> Self {
        Self {
            coordinator,
            gauge,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let gauge = Arc::clone(&state.gauge);

    Router::new()
        .merge(api::import_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            gauge,
            services::load_monitor::track_in_flight,
        ))
        .layer(TraceLayer::new_for_http())
}
