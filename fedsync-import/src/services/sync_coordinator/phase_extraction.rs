//! Phase 3: EXTRACTION
//!
//! Unpacks the downloaded archives and locates one dump per database.

use super::{RunContext, SyncCoordinator};
use crate::error::SyncError;
use crate::models::ImportStep;
use std::time::Instant;

impl SyncCoordinator {
    pub(super) async fn phase_extraction(&self, run: &mut RunContext) -> Result<(), SyncError> {
        const STEP: ImportStep = ImportStep::Extraction;
        self.enter_step(STEP);
        let started = Instant::now();

        let extract_dir = self.config.extract_dir();
        let extracted = self
            .extractor
            .extract_files(&run.downloaded, &extract_dir)
            .await
            .map_err(|e| e.in_step(STEP))?;

        let extracted_names: Vec<String> = extracted
            .values()
            .flatten()
            .map(|path| {
                path.strip_prefix(&extract_dir)
                    .unwrap_or(path)
                    .display()
                    .to_string()
            })
            .collect();
        self.tracker
            .update_files_info(|files| files.extracted = extracted_names.clone());

        let dumps = self
            .extractor
            .find_database_dumps(&extract_dir)
            .await
            .map_err(|e| e.in_step(STEP))?;

        if dumps.is_empty() {
            let expected: Vec<&str> = self.config.databases.keys().map(String::as_str).collect();
            return Err(SyncError::Archive(format!(
                "no dump found for any configured database ({})",
                expected.join(", ")
            ))
            .in_step(STEP));
        }

        for database in self.config.databases.keys() {
            if !dumps.contains_key(database) {
                self.tracker.warn(
                    STEP,
                    format!("No dump found for database '{}', it keeps its current content", database),
                );
            }
        }

        self.tracker.step_finished(
            STEP,
            format!(
                "Extracted {} file(s), found {} dump(s)",
                extracted_names.len(),
                dumps.len()
            ),
            started.elapsed(),
        );
        run.dumps = dumps;
        Ok(())
    }
}
