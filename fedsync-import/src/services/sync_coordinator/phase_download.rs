//! Phase 2: DOWNLOAD
//!
//! Recreates the staging area and fetches every listed file into it.

use super::{RunContext, SyncCoordinator};
use crate::error::SyncError;
use crate::models::ImportStep;
use std::path::Path;
use std::time::Instant;

impl SyncCoordinator {
    pub(super) async fn phase_download(&self, run: &mut RunContext) -> Result<(), SyncError> {
        const STEP: ImportStep = ImportStep::Download;
        self.enter_step(STEP);
        let started = Instant::now();

        let download_dir = self.config.download_dir();
        let extract_dir = self.config.extract_dir();
        reset_dir(&download_dir).await.map_err(|e| e.in_step(STEP))?;
        reset_dir(&extract_dir).await.map_err(|e| e.in_step(STEP))?;

        let downloaded = self
            .remote
            .download_files(&run.listing, &download_dir, &self.shutdown)
            .await
            .map_err(|e| e.in_step(STEP))?;

        self.tracker.update_files_info(|files| {
            files.downloaded = downloaded
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();
        });

        self.tracker.update_progress(STEP, ImportStep::Extraction.checkpoint());
        self.tracker.step_finished(
            STEP,
            format!("Downloaded {} file(s)", downloaded.len()),
            started.elapsed(),
        );
        run.downloaded = downloaded;
        Ok(())
    }
}

/// Empty `dir`, creating it when missing
async fn reset_dir(dir: &Path) -> Result<(), SyncError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}
