//! Phase 1: CHECKING_FRESHNESS
//!
//! Lists the remote files and compares them with the last successful import.

use super::{RunContext, SyncCoordinator};
use crate::error::SyncError;
use crate::models::ImportStep;
use std::time::Instant;

impl SyncCoordinator {
    /// Returns the skip reason when the run should end here
    pub(super) async fn phase_freshness(
        &self,
        run: &mut RunContext,
    ) -> Result<Option<String>, SyncError> {
        const STEP: ImportStep = ImportStep::CheckingFreshness;
        self.enter_step(STEP);
        let started = Instant::now();

        let listing = self
            .remote
            .list_files()
            .await
            .map_err(|e| e.in_step(STEP))?;

        self.tracker.update_files_info(|files| {
            files.remote_files = listing.iter().map(|f| f.name.clone()).collect();
        });
        self.tracker
            .info(STEP, format!("Remote source lists {} file(s)", listing.len()));
        run.listing = listing;

        if !self.config.freshness.enabled {
            self.tracker
                .step_finished(STEP, "Freshness check disabled", started.elapsed());
            return Ok(None);
        }

        // Freshness only saves work; a broken record means "import"
        let decision = match self.freshness.check(&run.listing).await {
            Ok(decision) => decision,
            Err(e) => {
                self.tracker.warn(
                    STEP,
                    format!("Freshness check failed, proceeding with import: {}", e),
                );
                return Ok(None);
            }
        };

        if decision.should_import {
            self.tracker.step_finished(
                STEP,
                format!("Remote data is newer: {}", decision.reason),
                started.elapsed(),
            );
            return Ok(None);
        }

        if self.config.freshness.skip_if_not_newer {
            self.tracker
                .step_finished(STEP, "Remote data not newer", started.elapsed());
            return Ok(Some(decision.reason));
        }

        self.tracker.step_finished(
            STEP,
            format!("{}; importing anyway", decision.reason),
            started.elapsed(),
        );
        Ok(None)
    }
}
