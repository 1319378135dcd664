//! Import status and log tracker
//!
//! Owns the run status snapshot, the single-flight flag and a bounded log
//! buffer behind one mutex: the flag test-and-set, every status mutation and
//! every log append are serialized, so a reader never observes a partially
//! applied update.

use crate::models::{
    FilesInfo, ImportLogEntry, ImportState, ImportStatus, ImportStep, ImportTrigger, LogSeverity,
};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

struct TrackerState {
    status: ImportStatus,
    running: bool,
    logs: VecDeque<ImportLogEntry>,
}

/// Thread-safe status and log store
pub struct StatusTracker {
    inner: Mutex<TrackerState>,
    log_capacity: usize,
}

impl StatusTracker {
    /// Create a tracker retaining at most `log_capacity` log entries
    pub fn new(log_capacity: usize) -> Self {
        let log_capacity = log_capacity.max(1);
        Self {
            inner: Mutex::new(TrackerState {
                status: ImportStatus::default(),
                running: false,
                logs: VecDeque::with_capacity(log_capacity),
            }),
            log_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    /// Claim the single-flight flag and reset the status for a new run
    ///
    /// Returns `None` when a run is already in progress.
    pub fn try_begin_run(&self, trigger: ImportTrigger) -> Option<Uuid> {
        let mut inner = self.lock();
        if inner.running {
            return None;
        }

        let run_id = Uuid::new_v4();
        let now = Utc::now();
        inner.running = true;

        let status = &mut inner.status;
        status.state = ImportState::Running;
        status.current_step = ImportStep::Initialization;
        status.progress_percent = 0;
        status.run_id = Some(run_id);
        status.trigger = Some(trigger);
        status.start_time = Some(now);
        status.last_execution_time = Some(now);
        status.last_error.clear();
        status.skip_reason = None;
        status.files_info = FilesInfo::default();

        Self::push_log(
            &mut inner,
            self.log_capacity,
            ImportLogEntry::new(
                ImportStep::Initialization,
                LogSeverity::Info,
                format!("Import run {} started ({} trigger)", run_id, trigger),
            ),
        );
        Some(run_id)
    }

    /// Whether the single-flight flag is held
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Set state, step and progress at once
    ///
    /// Progress never moves backwards within a run.
    pub fn update_status(&self, state: ImportState, step: ImportStep, progress: u8) {
        let mut inner = self.lock();
        inner.status.state = state;
        inner.status.current_step = step;
        Self::advance_progress(&mut inner.status, progress);
    }

    /// Move to a new step with the given progress
    pub fn update_progress(&self, step: ImportStep, progress: u8) {
        let mut inner = self.lock();
        inner.status.current_step = step;
        Self::advance_progress(&mut inner.status, progress);
    }

    /// Finish the current run successfully and release the single-flight flag
    pub fn mark_success(&self) {
        let mut inner = self.lock();
        let now = Utc::now();
        let status = &mut inner.status;
        let success_time = match status.start_time {
            Some(start) if start > now => start,
            _ => now,
        };
        status.state = ImportState::Succeeded;
        status.current_step = ImportStep::Completed;
        status.progress_percent = 100;
        status.last_success_time = Some(success_time);
        status.last_error.clear();
        inner.running = false;

        Self::push_log(
            &mut inner,
            self.log_capacity,
            ImportLogEntry::new(
                ImportStep::Completed,
                LogSeverity::Info,
                "Import run completed successfully",
            ),
        );
    }

    /// Finish the current run as failed and release the single-flight flag
    pub fn mark_failed(&self, error: &str, step: ImportStep) {
        let message = if error.trim().is_empty() {
            "unknown error".to_string()
        } else {
            error.to_string()
        };

        let mut inner = self.lock();
        inner.status.state = ImportState::Failed;
        inner.status.current_step = step;
        inner.status.last_error = message.clone();
        inner.running = false;

        Self::push_log(
            &mut inner,
            self.log_capacity,
            ImportLogEntry::new(step, LogSeverity::Error, format!("Import run failed: {}", message)),
        );
    }

    /// Finish the current run as skipped and release the single-flight flag
    pub fn mark_skipped(&self, reason: &str, step: ImportStep) {
        let mut inner = self.lock();
        inner.status.state = ImportState::Skipped;
        inner.status.current_step = step;
        inner.status.skip_reason = Some(reason.to_string());
        inner.status.last_error.clear();
        inner.running = false;

        Self::push_log(
            &mut inner,
            self.log_capacity,
            ImportLogEntry::new(step, LogSeverity::Info, format!("Import run skipped: {}", reason)),
        );
    }

    /// Replace the files record of the current run
    pub fn set_files_info(&self, info: FilesInfo) {
        self.lock().status.files_info = info;
    }

    /// Edit the files record of the current run in place
    pub fn update_files_info(&self, edit: impl FnOnce(&mut FilesInfo)) {
        edit(&mut self.lock().status.files_info);
    }

    /// Snapshot of the current status
    pub fn get_status(&self) -> ImportStatus {
        self.lock().status.clone()
    }

    /// Most recent log entries first
    ///
    /// `limit == 0` returns every retained entry. The result never exceeds
    /// the buffer capacity.
    pub fn get_logs(&self, limit: usize) -> Vec<ImportLogEntry> {
        let inner = self.lock();
        let take = if limit == 0 {
            inner.logs.len()
        } else {
            limit.min(inner.logs.len())
        };
        inner.logs.iter().rev().take(take).cloned().collect()
    }

    pub fn info(&self, step: ImportStep, message: impl Into<String>) {
        self.log(ImportLogEntry::new(step, LogSeverity::Info, message));
    }

    pub fn warn(&self, step: ImportStep, message: impl Into<String>) {
        self.log(ImportLogEntry::new(step, LogSeverity::Warning, message));
    }

    /// Close a step with an info entry carrying its duration
    pub fn step_finished(&self, step: ImportStep, message: impl Into<String>, duration: Duration) {
        self.log(ImportLogEntry::new(step, LogSeverity::Info, message).with_duration(duration));
    }

    /// Append an entry, evicting the oldest one when full
    pub fn log(&self, entry: ImportLogEntry) {
        let mut inner = self.lock();
        Self::push_log(&mut inner, self.log_capacity, entry);
    }

    fn push_log(inner: &mut TrackerState, capacity: usize, entry: ImportLogEntry) {
        let run_id = inner.status.run_id;
        match entry.severity {
            LogSeverity::Info => tracing::info!(
                run_id = ?run_id,
                step = %entry.step,
                duration_ms = ?entry.duration_ms,
                "{}",
                entry.message
            ),
            LogSeverity::Warning => tracing::warn!(
                run_id = ?run_id,
                step = %entry.step,
                "{}",
                entry.message
            ),
            LogSeverity::Error => tracing::error!(
                run_id = ?run_id,
                step = %entry.step,
                "{}",
                entry.message
            ),
        }

        while inner.logs.len() >= capacity {
            inner.logs.pop_front();
        }
        inner.logs.push_back(entry);
    }

    fn advance_progress(status: &mut ImportStatus, progress: u8) {
        let progress = progress.min(100);
        if progress > status.progress_percent {
            status.progress_percent = progress;
        }
    }
}
