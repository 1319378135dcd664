//! Import run coordinator
//!
//! Sequences one synchronization run through its phases:
//! CHECKING_FRESHNESS → DOWNLOAD → EXTRACTION → DATABASE_IMPORT → CACHE_CLEANUP → CLEANUP
//!
//! Each phase lives in its own `phase_*` module. Download, extraction and
//! database import failures abort the run; cache flush, record persistence
//! and staging cleanup only produce warnings because the databases are
//! already replaced by then.
//!
//! # Entry points
//! - [`SyncCoordinator::trigger_manual`]: claims the single-flight flag
//!   before returning, then runs on a background task
//! - [`SyncCoordinator::trigger_scheduled`]: runs inline after the
//!   backpressure check; a busy coordinator is a silent no-op
//!
//! [`SyncCoordinator::stop`] cancels the shared token. Cancellation is
//! observed by the backpressure wait, by in-flight transfers and between
//! phases up to the database import; once databases have been replaced the
//! run completes its bookkeeping.

use crate::config::ImportConfig;
use crate::error::SyncError;
use crate::models::{
    FileMetadata, ImportLogEntry, ImportState, ImportStatus, ImportStep, ImportSummary,
    ImportTrigger,
};
use crate::services::cache::{self, CacheService};
use crate::services::completion::{CompletionListener, ListenerRegistry};
use crate::services::database_importer::{DatabaseImporter, SqliteDatabaseImporter};
use crate::services::freshness_checker::{FreshnessChecker, FreshnessStore};
use crate::services::load_monitor::LoadSensor;
use crate::services::remote_source::{HttpRemoteSource, RemoteSource};
use crate::services::status_tracker::StatusTracker;
use crate::services::ArchiveExtractor;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

mod backpressure;
mod phase_cleanup;
mod phase_database_import;
mod phase_download;
mod phase_extraction;
mod phase_freshness;

/// Reason recorded when a scheduled run gives up waiting for load to drop
pub const HEAVY_LOAD_SKIP_REASON: &str = "api_under_heavy_load";

/// External services the coordinator drives
pub struct Collaborators {
    pub remote: Arc<dyn RemoteSource>,
    pub importer: Arc<dyn DatabaseImporter>,
    pub cache: Arc<dyn CacheService>,
    /// No sensor means scheduled runs never wait
    pub load_sensor: Option<Arc<dyn LoadSensor>>,
}

/// State carried from one phase to the next
struct RunContext {
    run_id: Uuid,
    trigger: ImportTrigger,
    started_at: DateTime<Utc>,
    listing: Vec<FileMetadata>,
    downloaded: Vec<PathBuf>,
    dumps: BTreeMap<String, PathBuf>,
    warnings: Vec<String>,
}

impl RunContext {
    fn new(run_id: Uuid, trigger: ImportTrigger) -> Self {
        Self {
            run_id,
            trigger,
            started_at: Utc::now(),
            listing: Vec::new(),
            downloaded: Vec::new(),
            dumps: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }
}

/// How the phase sequence ended, short of an error
enum RunOutcome {
    Completed,
    Skipped { reason: String, step: ImportStep },
}

/// Import run coordinator
pub struct SyncCoordinator {
    config: ImportConfig,
    tracker: Arc<StatusTracker>,
    remote: Arc<dyn RemoteSource>,
    freshness: FreshnessChecker,
    extractor: ArchiveExtractor,
    importer: Arc<dyn DatabaseImporter>,
    cache: Arc<dyn CacheService>,
    load_sensor: Option<Arc<dyn LoadSensor>>,
    listeners: ListenerRegistry,
    /// Supervisor handles of listener notifications not yet drained
    notifications: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl SyncCoordinator {
    pub fn new(config: ImportConfig, collaborators: Collaborators) -> Self {
        let tracker = Arc::new(StatusTracker::new(config.log_capacity));
        let freshness = FreshnessChecker::new(FreshnessStore::new(&config.freshness.record_path));
        let extractor = ArchiveExtractor::new(config.databases.keys().cloned());

        Self {
            config,
            tracker,
            remote: collaborators.remote,
            freshness,
            extractor,
            importer: collaborators.importer,
            cache: collaborators.cache,
            load_sensor: collaborators.load_sensor,
            listeners: ListenerRegistry::new(),
            notifications: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Coordinator wired to the HTTP remote source, SQLite targets and the
    /// configured cache endpoint
    pub fn from_config(
        config: ImportConfig,
        load_sensor: Option<Arc<dyn LoadSensor>>,
    ) -> Result<Self, SyncError> {
        let remote = Arc::new(HttpRemoteSource::new(&config.remote)?);
        let importer = Arc::new(SqliteDatabaseImporter::new(config.databases.clone()));
        let cache: Arc<dyn CacheService> = Arc::from(cache::from_config(&config.cache)?);

        Ok(Self::new(
            config,
            Collaborators {
                remote,
                importer,
                cache,
                load_sensor,
            },
        ))
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    pub fn register_listener(&self, listener: Arc<dyn CompletionListener>) {
        self.listeners.register(listener);
    }

    fn ensure_accepting(&self) -> Result<(), SyncError> {
        if !self.config.enabled {
            return Err(SyncError::Disabled);
        }
        if self.shutdown.is_cancelled() {
            return Err(SyncError::Stopped);
        }
        Ok(())
    }

    /// Start a run on a background task
    ///
    /// The single-flight flag is claimed before this returns, so an
    /// immediate second call observes [`SyncError::AlreadyRunning`].
    pub fn trigger_manual(self: &Arc<Self>) -> Result<Uuid, SyncError> {
        self.ensure_accepting()?;
        let run_id = self
            .tracker
            .try_begin_run(ImportTrigger::Manual)
            .ok_or(SyncError::AlreadyRunning)?;

        let coordinator = Arc::clone(self);
        let run = tokio::spawn(async move {
            coordinator.execute_run(run_id, ImportTrigger::Manual).await;
        });

        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            if let Err(e) = run.await {
                release_crashed_run(&tracker, e);
            }
        });

        Ok(run_id)
    }

    /// Run on behalf of the periodic trigger
    ///
    /// Returns `Ok(())` without doing anything when a run is in progress.
    /// The run's own outcome is recorded in the status, not returned; only
    /// a stop during the backpressure wait is reported as an error.
    pub async fn trigger_scheduled(self: &Arc<Self>) -> Result<(), SyncError> {
        self.ensure_accepting()?;
        let Some(run_id) = self.tracker.try_begin_run(ImportTrigger::Scheduled) else {
            tracing::info!("Scheduled import skipped, already running");
            return Ok(());
        };

        let coordinator = Arc::clone(self);
        let run = tokio::spawn(async move { coordinator.execute_scheduled(run_id).await });

        match run.await {
            Ok(result) => result,
            Err(e) => {
                release_crashed_run(&self.tracker, e);
                Ok(())
            }
        }
    }

    async fn execute_scheduled(&self, run_id: Uuid) -> Result<(), SyncError> {
        match self.wait_for_capacity().await {
            Ok(true) => {}
            Ok(false) => {
                self.tracker
                    .mark_skipped(HEAVY_LOAD_SKIP_REASON, ImportStep::Initialization);
                return Ok(());
            }
            Err(e) => {
                self.tracker
                    .mark_failed(&e.to_string(), ImportStep::Initialization);
                return Err(e);
            }
        }

        self.execute_run(run_id, ImportTrigger::Scheduled).await;
        Ok(())
    }

    /// Cancel the current run (if any) and refuse further triggers
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!("Import coordinator stopping");
            self.shutdown.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Check remote connectivity without listing files
    pub async fn test_connection(&self) -> Result<(), SyncError> {
        self.remote.test_connection().await
    }

    pub fn get_status(&self) -> ImportStatus {
        self.tracker.get_status()
    }

    pub fn get_logs(&self, limit: usize) -> Vec<ImportLogEntry> {
        self.tracker.get_logs(limit)
    }

    /// Run every phase and record the outcome; returns the final state
    async fn execute_run(&self, run_id: Uuid, trigger: ImportTrigger) -> ImportState {
        let mut run = RunContext::new(run_id, trigger);

        tracing::info!(
            run_id = %run_id,
            trigger = %trigger,
            "Starting import run"
        );

        match self.run_phases(&mut run).await {
            Ok(RunOutcome::Completed) => {
                self.tracker.mark_success();
                self.notify_listeners(&run);
                ImportState::Succeeded
            }
            Ok(RunOutcome::Skipped { reason, step }) => {
                self.tracker.mark_skipped(&reason, step);
                ImportState::Skipped
            }
            Err(e) => {
                let step = e
                    .step()
                    .unwrap_or_else(|| self.tracker.get_status().current_step);
                self.tracker.mark_failed(&e.to_string(), step);
                ImportState::Failed
            }
        }
    }

    async fn run_phases(&self, run: &mut RunContext) -> Result<RunOutcome, SyncError> {
        if let Some(reason) = self.phase_freshness(run).await? {
            return Ok(RunOutcome::Skipped {
                reason,
                step: ImportStep::CheckingFreshness,
            });
        }

        self.ensure_active(ImportStep::Download)?;
        self.phase_download(run).await?;

        self.ensure_active(ImportStep::Extraction)?;
        self.phase_extraction(run).await?;

        self.ensure_active(ImportStep::DatabaseImport)?;
        self.phase_database_import(run).await?;

        self.phase_cache_flush(run).await;
        self.phase_cleanup(run).await;

        Ok(RunOutcome::Completed)
    }

    fn ensure_active(&self, next: ImportStep) -> Result<(), SyncError> {
        if self.shutdown.is_cancelled() {
            return Err(SyncError::Stopped.in_step(next));
        }
        Ok(())
    }

    fn enter_step(&self, step: ImportStep) {
        self.tracker
            .update_status(ImportState::Running, step, step.checkpoint());
    }

    fn notify_listeners(&self, run: &RunContext) {
        if self.listeners.is_empty() {
            return;
        }
        let summary = ImportSummary {
            run_id: run.run_id,
            trigger: run.trigger,
            started_at: run.started_at,
            finished_at: Utc::now(),
            files_info: self.tracker.get_status().files_info,
            warnings: run.warnings.clone(),
        };
        tracing::info!(
            run_id = %summary.run_id,
            duration_seconds = summary.duration_seconds(),
            listeners = self.listeners.len(),
            "Notifying completion listeners"
        );

        let handles = self.listeners.notify_all(&summary);
        let mut pending = self
            .notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.retain(|handle| !handle.is_finished());
        pending.extend(handles);
    }

    /// Wait for listener notifications still in flight
    ///
    /// Supervisors log listener failures themselves, so this only waits.
    pub async fn drain_notifications(&self) {
        let pending = std::mem::take(
            &mut *self
                .notifications
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Listener supervisor did not finish");
            }
        }
    }
}

/// Fail a run whose task panicked or was aborted so the flag is released
fn release_crashed_run(tracker: &StatusTracker, error: tokio::task::JoinError) {
    let step = tracker.get_status().current_step;
    tracing::error!(error = %error, step = %step, "Import task aborted");
    tracker.mark_failed(&format!("import task aborted: {}", error), step);
}
