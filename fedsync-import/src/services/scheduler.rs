//! Periodic import trigger
//!
//! The coordinator only exposes `trigger_scheduled`; anything that calls it
//! periodically is a [`PeriodicTrigger`]. [`CronTrigger`] drives it from a
//! six-field cron expression (seconds first).

use crate::error::SyncError;
use crate::services::SyncCoordinator;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

#[async_trait]
pub trait PeriodicTrigger: Send + Sync {
    async fn start(&mut self) -> Result<(), SyncError>;
    async fn shutdown(&mut self) -> Result<(), SyncError>;
}

/// Cron-driven trigger built on `tokio-cron-scheduler`
pub struct CronTrigger {
    schedule: String,
    coordinator: Arc<SyncCoordinator>,
    scheduler: Option<JobScheduler>,
}

impl CronTrigger {
    pub fn new(schedule: impl Into<String>, coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            schedule: schedule.into(),
            coordinator,
            scheduler: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }
}

#[async_trait]
impl PeriodicTrigger for CronTrigger {
    /// Register the job and start ticking; a disabled import is never scheduled
    async fn start(&mut self) -> Result<(), SyncError> {
        if self.scheduler.is_some() {
            return Ok(());
        }
        if !self.coordinator.config().enabled {
            tracing::info!("Import disabled, periodic trigger not started");
            return Ok(());
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SyncError::Scheduler(format!("creating scheduler: {}", e)))?;

        let coordinator = Arc::clone(&self.coordinator);
        let job = Job::new_async(self.schedule.as_str(), move |_job_id, _scheduler| {
            let coordinator = Arc::clone(&coordinator);
            Box::pin(async move {
                tracing::debug!("Periodic import trigger fired");
                if let Err(e) = coordinator.trigger_scheduled().await {
                    tracing::warn!(error = %e, "Scheduled import not started");
                }
            })
        })
        .map_err(|e| {
            SyncError::Scheduler(format!("invalid schedule '{}': {}", self.schedule, e))
        })?;

        scheduler
            .add(job)
            .await
            .map_err(|e| SyncError::Scheduler(format!("adding import job: {}", e)))?;
        scheduler
            .start()
            .await
            .map_err(|e| SyncError::Scheduler(format!("starting scheduler: {}", e)))?;

        tracing::info!(schedule = %self.schedule, "Periodic import trigger started");
        self.scheduler = Some(scheduler);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), SyncError> {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| SyncError::Scheduler(format!("stopping scheduler: {}", e)))?;
            tracing::info!("Periodic import trigger stopped");
        }
        Ok(())
    }
}
