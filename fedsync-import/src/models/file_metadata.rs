//! Remote file metadata and the persisted record of the last successful import

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk format of [`FreshnessRecord`]
pub const FRESHNESS_RECORD_VERSION: u32 = 1;

/// Metadata of one remote file, as reported by the listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Content fingerprint (e.g. an ETag), when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Remote metadata of the most recent successful import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessRecord {
    pub version: u32,
    pub imported_at: DateTime<Utc>,
    pub files: Vec<FileMetadata>,
}

impl FreshnessRecord {
    pub fn new(files: Vec<FileMetadata>) -> Self {
        Self {
            version: FRESHNESS_RECORD_VERSION,
            imported_at: Utc::now(),
            files,
        }
    }

    pub fn find(&self, name: &str) -> Option<&FileMetadata> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// Outcome of a freshness check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessDecision {
    pub should_import: bool,
    pub reason: String,
}

impl FreshnessDecision {
    pub fn import(reason: impl Into<String>) -> Self {
        Self {
            should_import: true,
            reason: reason.into(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            should_import: false,
            reason: reason.into(),
        }
    }
}
