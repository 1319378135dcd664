//! Summary of a successful import run, handed to completion listeners

use super::{FilesInfo, ImportTrigger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub run_id: Uuid,
    pub trigger: ImportTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files_info: FilesInfo,
    /// Non-fatal problems (cache flush, metadata persistence, cleanup)
    pub warnings: Vec<String>,
}

impl ImportSummary {
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }
}
