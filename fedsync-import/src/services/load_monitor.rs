//! Serving-load sensors used for scheduled-run backpressure

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Reports whether the serving system is currently overloaded
pub trait LoadSensor: Send + Sync {
    fn is_overloaded(&self) -> bool;
}

impl<F> LoadSensor for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_overloaded(&self) -> bool {
        self()
    }
}

/// Counts in-flight HTTP requests; overloaded at or above `threshold`
#[derive(Debug)]
pub struct InFlightGauge {
    in_flight: AtomicUsize,
    threshold: usize,
}

impl InFlightGauge {
    pub fn new(threshold: usize) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            threshold: threshold.max(1),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Count one request until the guard is dropped
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            gauge: Arc::clone(self),
        }
    }
}

impl LoadSensor for InFlightGauge {
    fn is_overloaded(&self) -> bool {
        self.in_flight() >= self.threshold
    }
}

pub struct InFlightGuard {
    gauge: Arc<InFlightGauge>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

/// axum middleware feeding the gauge
pub async fn track_in_flight(
    State(gauge): State<Arc<InFlightGauge>>,
    request: Request,
    next: Next,
) -> Response {
    let _guard = gauge.enter();
    next.run(request).await
}
