//! Import run state machine
//!
//! A run progresses through fixed steps:
//! Initialization → CheckingFreshness → Download → Extraction → DatabaseImport
//! → CacheCleanup → Cleanup → Completed
//!
//! Each step has a fixed progress checkpoint, so the current step alone is
//! enough to estimate how far a run has come.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall state of the import subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    /// No run has happened since startup
    Idle,
    /// A run is in progress
    Running,
    /// Last run completed successfully
    Succeeded,
    /// Last run aborted with an error
    Failed,
    /// Last run ended without doing work (data not newer, system busy)
    Skipped,
}

impl ImportState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportState::Succeeded | ImportState::Failed | ImportState::Skipped
        )
    }
}

/// Phase of an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStep {
    Initialization,
    CheckingFreshness,
    Download,
    Extraction,
    DatabaseImport,
    CacheCleanup,
    Cleanup,
    Completed,
}

impl ImportStep {
    /// Progress percentage reported when the step begins
    pub fn checkpoint(&self) -> u8 {
        match self {
            ImportStep::Initialization => 0,
            ImportStep::CheckingFreshness => 10,
            ImportStep::Download => 15,
            ImportStep::Extraction => 40,
            ImportStep::DatabaseImport => 60,
            ImportStep::CacheCleanup => 85,
            ImportStep::Cleanup => 95,
            ImportStep::Completed => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStep::Initialization => "initialization",
            ImportStep::CheckingFreshness => "checking_freshness",
            ImportStep::Download => "download",
            ImportStep::Extraction => "extraction",
            ImportStep::DatabaseImport => "database_import",
            ImportStep::CacheCleanup => "cache_cleanup",
            ImportStep::Cleanup => "cleanup",
            ImportStep::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ImportStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportTrigger {
    Manual,
    Scheduled,
}

impl std::fmt::Display for ImportTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportTrigger::Manual => f.write_str("manual"),
            ImportTrigger::Scheduled => f.write_str("scheduled"),
        }
    }
}

/// Files seen and produced by the current (or last) run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesInfo {
    /// Remote file names returned by the listing
    pub remote_files: Vec<String>,
    /// Local file names fetched into the staging area
    pub downloaded: Vec<String>,
    /// File names produced by archive extraction
    pub extracted: Vec<String>,
    /// Databases whose content was replaced
    pub imported: Vec<String>,
}

/// Snapshot of the import subsystem status
///
/// Always handed out by value; holders never observe later mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportStatus {
    pub state: ImportState,
    pub current_step: ImportStep,
    /// 0-100, non-decreasing within a run
    pub progress_percent: u8,
    /// Identifier of the current (or last) run
    pub run_id: Option<Uuid>,
    pub trigger: Option<ImportTrigger>,
    pub start_time: Option<DateTime<Utc>>,
    pub last_execution_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    /// Non-empty only when `state == Failed`
    pub last_error: String,
    /// Reason of the last skipped run
    pub skip_reason: Option<String>,
    pub files_info: FilesInfo,
}

impl Default for ImportStatus {
    fn default() -> Self {
        Self {
            state: ImportState::Idle,
            current_step: ImportStep::Initialization,
            progress_percent: 0,
            run_id: None,
            trigger: None,
            start_time: None,
            last_execution_time: None,
            last_success_time: None,
            last_error: String::new(),
            skip_reason: None,
            files_info: FilesInfo::default(),
        }
    }
}

impl ImportStatus {
    pub fn is_running(&self) -> bool {
        self.state == ImportState::Running
    }
}
