//! Read-side cache invalidation
//!
//! Called once after every successful import so the query services stop
//! serving data from the replaced databases.

use crate::config::CacheConfig;
use crate::error::SyncError;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait CacheService: Send + Sync {
    /// Drop every cached entry
    async fn flush_all(&self, cancel: &CancellationToken) -> Result<(), SyncError>;
}

/// Flushes caches by POSTing to the read-side service
pub struct HttpCacheService {
    client: reqwest::Client,
    flush_url: String,
}

impl HttpCacheService {
    pub fn new(flush_url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            flush_url: flush_url.into(),
        })
    }
}

#[async_trait]
impl CacheService for HttpCacheService {
    async fn flush_all(&self, cancel: &CancellationToken) -> Result<(), SyncError> {
        let request = self.client.post(&self.flush_url).send();
        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Stopped),
            resp = request => resp.map_err(|e| SyncError::Cache(e.to_string()))?,
        };

        if !resp.status().is_success() {
            return Err(SyncError::Cache(format!(
                "{} returned {}",
                self.flush_url,
                resp.status()
            )));
        }
        tracing::debug!(url = %self.flush_url, "Read-side caches flushed");
        Ok(())
    }
}

/// Used when no flush endpoint is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheService;

#[async_trait]
impl CacheService for NoopCacheService {
    async fn flush_all(&self, _cancel: &CancellationToken) -> Result<(), SyncError> {
        tracing::debug!("No cache flush endpoint configured");
        Ok(())
    }
}

/// Cache service matching the configuration
pub fn from_config(config: &CacheConfig) -> Result<Box<dyn CacheService>, SyncError> {
    match config.flush_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(Box::new(HttpCacheService::new(
            url,
            Duration::from_secs(config.timeout_secs),
        )?)),
        _ => Ok(Box::new(NoopCacheService)),
    }
}
