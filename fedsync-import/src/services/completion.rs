//! Completion listener registry
//!
//! After a successful run every registered listener is invoked on its own
//! task. A supervisor task per listener awaits it and logs a panic or
//! cancellation; nothing propagates back to the coordinator. Invocation
//! order is unspecified.

use crate::models::ImportSummary;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;

/// External component interested in successful imports
#[async_trait]
pub trait CompletionListener: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn on_import_completed(&self, summary: &ImportSummary);
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn CompletionListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn CompletionListener>) {
        tracing::debug!(listener = listener.name(), "Completion listener registered");
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener in isolation
    ///
    /// Returns the supervisor handles; they always complete normally.
    pub fn notify_all(&self, summary: &ImportSummary) -> Vec<JoinHandle<()>> {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let summary = Arc::new(summary.clone());

        listeners
            .into_iter()
            .map(|listener| {
                let name = listener.name().to_string();
                let run_summary = Arc::clone(&summary);
                let task = tokio::spawn(async move {
                    listener.on_import_completed(&run_summary).await;
                });

                let run_id = summary.run_id;
                tokio::spawn(async move {
                    match task.await {
                        Ok(()) => {
                            tracing::debug!(listener = %name, run_id = %run_id, "Completion listener finished")
                        }
                        Err(e) if e.is_panic() => {
                            tracing::error!(listener = %name, run_id = %run_id, "Completion listener panicked")
                        }
                        Err(e) => {
                            tracing::warn!(listener = %name, run_id = %run_id, error = %e, "Completion listener did not finish")
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilesInfo, ImportTrigger};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CompletionListener for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn on_import_completed(&self, _summary: &ImportSummary) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicking;

    #[async_trait]
    impl CompletionListener for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn on_import_completed(&self, _summary: &ImportSummary) {
            panic!("listener failure");
        }
    }

    fn summary() -> ImportSummary {
        ImportSummary {
            run_id: Uuid::new_v4(),
            trigger: ImportTrigger::Manual,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            files_info: FilesInfo::default(),
            warnings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_panicking_listener_is_isolated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ListenerRegistry::new();
        registry.register(Arc::new(Panicking));
        registry.register(Arc::new(Counting { calls: Arc::clone(&calls) }));
        registry.register(Arc::new(Counting { calls: Arc::clone(&calls) }));
        assert_eq!(registry.len(), 3);

        for handle in registry.notify_all(&summary()) {
            assert!(handle.await.is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_listeners_is_fine() {
        let registry = ListenerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.notify_all(&summary()).is_empty());
    }
}
