//! Operational history of import runs

use super::ImportStep;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log entry severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

/// One timestamped entry of the import log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub timestamp: DateTime<Utc>,
    pub step: ImportStep,
    pub message: String,
    /// How long the step (or operation) took, when the entry closes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub severity: LogSeverity,
}

impl ImportLogEntry {
    pub fn new(step: ImportStep, severity: LogSeverity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            step,
            message: message.into(),
            duration_ms: None,
            severity,
        }
    }

    pub fn with_duration(mut self, duration: std::time::Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }
}
