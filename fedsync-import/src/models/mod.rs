//! Data models for the import subsystem
//!
//! - Run status state machine and log entries
//! - Remote file metadata and the persisted freshness record
//! - Completion summary

pub mod file_metadata;
pub mod import_log;
pub mod import_result;
pub mod import_status;

pub use file_metadata::{FileMetadata, FreshnessDecision, FreshnessRecord, FRESHNESS_RECORD_VERSION};
pub use import_log::{ImportLogEntry, LogSeverity};
pub use import_result::ImportSummary;
pub use import_status::{FilesInfo, ImportState, ImportStatus, ImportStep, ImportTrigger};
