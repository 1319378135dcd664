//! Phases 5 and 6: CACHE_CLEANUP and CLEANUP
//!
//! Both run after the databases were replaced, so failures here are
//! warnings and never change the run's outcome.

use super::{RunContext, SyncCoordinator};
use crate::models::ImportStep;
use std::time::Instant;

impl SyncCoordinator {
    pub(super) async fn phase_cache_flush(&self, run: &mut RunContext) {
        const STEP: ImportStep = ImportStep::CacheCleanup;
        self.enter_step(STEP);
        let started = Instant::now();

        match self.cache.flush_all(&self.shutdown).await {
            Ok(()) => self
                .tracker
                .step_finished(STEP, "Read-side caches flushed", started.elapsed()),
            Err(e) => self.warn_run(run, STEP, format!("Cache flush failed: {}", e)),
        }
    }

    pub(super) async fn phase_cleanup(&self, run: &mut RunContext) {
        const STEP: ImportStep = ImportStep::Cleanup;
        self.enter_step(STEP);
        let started = Instant::now();

        if let Err(e) = self.freshness.record_success(&run.listing).await {
            self.warn_run(
                run,
                STEP,
                format!(
                    "Could not persist import record to {}: {}",
                    self.freshness.store().path().display(),
                    e
                ),
            );
        }

        if self.config.cleanup_on_success {
            match tokio::fs::remove_dir_all(&self.config.staging_dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => self.warn_run(
                    run,
                    STEP,
                    format!(
                        "Could not remove staging directory {}: {}",
                        self.config.staging_dir.display(),
                        e
                    ),
                ),
            }
        }

        self.tracker
            .step_finished(STEP, "Cleanup finished", started.elapsed());
    }

    fn warn_run(&self, run: &mut RunContext, step: ImportStep, message: String) {
        self.tracker.warn(step, message.clone());
        run.warnings.push(message);
    }
}
