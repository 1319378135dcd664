//! Shared test helpers: fake collaborators, fixtures and waiting utilities

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;

use fedsync_import::models::ImportStatus;
use fedsync_import::services::SyncCoordinator;
use std::time::Duration;

/// Wait until the coordinator has no run in progress
pub async fn wait_for_idle(coordinator: &SyncCoordinator) -> ImportStatus {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let status = coordinator.get_status();
        if !coordinator.tracker().is_running() && status.state.is_terminal() {
            return status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "run did not finish in time, last status: {:?}",
            status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll `condition` for up to five seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
