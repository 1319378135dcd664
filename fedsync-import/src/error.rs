//! Error types for fedsync-import
//!
//! `SyncError` is the pipeline taxonomy:
//! - Caller misuse (`AlreadyRunning`, `Disabled`, `Stopped`) is returned synchronously
//! - Phase failures are wrapped with their step via [`SyncError::in_step`]
//!
//! `ApiError` maps everything onto HTTP responses.

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ImportStep;

/// Import pipeline error
#[derive(Debug, Error)]
pub enum SyncError {
    /// A run is already in progress
    #[error("Import already running")]
    AlreadyRunning,

    /// Import feature is turned off in configuration
    #[error("Import is disabled")]
    Disabled,

    /// Coordinator was stopped (shutdown or explicit stop)
    #[error("Import stopped")]
    Stopped,

    /// Remote listing, transfer or connectivity failure
    #[error("Remote source error: {0}")]
    Remote(String),

    /// Archive could not be decompressed or read
    #[error("Archive error: {0}")]
    Archive(String),

    /// A dump could not be loaded into its target database
    #[error("Database import failed for '{database}': {message}")]
    DatabaseImport {
        database: String,
        /// Databases replaced before the failure
        imported: Vec<String>,
        message: String,
    },

    /// Persisted freshness record missing, unreadable or unwritable
    #[error("Freshness record error: {0}")]
    Freshness(String),

    /// Cache invalidation failure
    #[error("Cache flush failed: {0}")]
    Cache(String),

    /// Error raised inside a phase, with the phase attached
    #[error("{step} failed: {source}")]
    Phase {
        step: ImportStep,
        #[source]
        source: Box<SyncError>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Periodic trigger could not be created or started
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// fedsync-common error
    #[error("Common error: {0}")]
    Common(#[from] fedsync_common::Error),
}

impl SyncError {
    /// Attach phase context (no-op if already attached)
    pub fn in_step(self, step: ImportStep) -> Self {
        match self {
            SyncError::Phase { .. } => self,
            other => SyncError::Phase {
                step,
                source: Box::new(other),
            },
        }
    }

    /// Step the error was raised in, if known
    pub fn step(&self) -> Option<ImportStep> {
        match self {
            SyncError::Phase { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Innermost error, without phase context
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::Phase { source, .. } => source.root(),
            other => other,
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - import already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream failure (502) - remote source unreachable
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Service unavailable (503) - import disabled or stopped
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err.root() {
            SyncError::AlreadyRunning => ApiError::Conflict(err.to_string()),
            SyncError::Disabled | SyncError::Stopped => ApiError::Unavailable(err.to_string()),
            SyncError::Remote(_) | SyncError::Http(_) => ApiError::BadGateway(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
