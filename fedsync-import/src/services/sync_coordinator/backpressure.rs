//! Load check before scheduled runs

use super::SyncCoordinator;
use crate::error::SyncError;
use crate::models::ImportStep;

impl SyncCoordinator {
    /// Wait until the serving system has capacity
    ///
    /// `Ok(true)` when clear, `Ok(false)` when still overloaded after
    /// `max_attempts` re-checks, `Err(Stopped)` when stopped while waiting.
    pub(super) async fn wait_for_capacity(&self) -> Result<bool, SyncError> {
        let settings = &self.config.backpressure;
        let sensor = match &self.load_sensor {
            Some(sensor) if settings.enabled => sensor,
            _ => return Ok(true),
        };

        if !sensor.is_overloaded() {
            return Ok(true);
        }

        for attempt in 1..=settings.max_attempts {
            self.tracker.warn(
                ImportStep::Initialization,
                format!(
                    "Serving system overloaded, deferring scheduled import ({}/{}, next check in {}s)",
                    attempt, settings.max_attempts, settings.delay_secs
                ),
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(attempt, "Backpressure wait interrupted by stop");
                    return Err(SyncError::Stopped);
                }
                _ = tokio::time::sleep(settings.delay()) => {}
            }

            if !sensor.is_overloaded() {
                tracing::debug!(attempt, "Load dropped, scheduled import proceeding");
                return Ok(true);
            }
        }

        tracing::warn!(
            attempts = settings.max_attempts,
            "Serving system still overloaded, giving up"
        );
        Ok(false)
    }
}
