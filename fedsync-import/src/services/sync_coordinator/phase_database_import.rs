//! Phase 4: DATABASE_IMPORT

use super::{RunContext, SyncCoordinator};
use crate::error::SyncError;
use crate::models::ImportStep;
use std::time::Instant;

impl SyncCoordinator {
    pub(super) async fn phase_database_import(&self, run: &mut RunContext) -> Result<(), SyncError> {
        const STEP: ImportStep = ImportStep::DatabaseImport;
        self.enter_step(STEP);
        let started = Instant::now();

        match self.importer.import_databases(&run.dumps).await {
            Ok(imported) => {
                self.tracker.step_finished(
                    STEP,
                    format!("Imported {} database(s): {}", imported.len(), imported.join(", ")),
                    started.elapsed(),
                );
                self.tracker
                    .update_files_info(|files| files.imported = imported);
                Ok(())
            }
            Err(e) => {
                if let SyncError::DatabaseImport { imported, .. } = &e {
                    if !imported.is_empty() {
                        self.tracker.warn(
                            STEP,
                            format!(
                                "Databases already replaced before the failure: {}",
                                imported.join(", ")
                            ),
                        );
                    }
                    let imported = imported.clone();
                    self.tracker
                        .update_files_info(|files| files.imported = imported);
                }
                Err(e.in_step(STEP))
            }
        }
    }
}
