//! Remote data source
//!
//! Listing and transfer are separate operations so freshness can be judged
//! before any bytes are transferred. Connectivity can be tested without a
//! listing.
//!
//! `HttpRemoteSource` maps the operations onto plain HTTP:
//! - list: one HEAD per configured file (`Content-Length`, `Last-Modified`, `ETag`)
//! - download: streamed GET into `<name>.part`, renamed when complete
//! - test: one HEAD against the base URL

use crate::config::RemoteConfig;
use crate::error::SyncError;
use crate::models::FileMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_LENGTH, ETAG, LAST_MODIFIED};
use reqwest::{Method, RequestBuilder, StatusCode};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

const USER_AGENT: &str = concat!("fedsync-import/", env!("CARGO_PKG_VERSION"));

/// Source of the authoritative federation data files
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Metadata of every file that makes up one data release
    async fn list_files(&self) -> Result<Vec<FileMetadata>, SyncError>;

    /// Fetch `files` into `dest_dir`, returning the local paths
    ///
    /// Any failure fails the whole transfer; there is no partial result.
    async fn download_files(
        &self,
        files: &[FileMetadata],
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, SyncError>;

    /// Check that the source is reachable and accepts our credentials
    async fn test_connection(&self) -> Result<(), SyncError>;
}

/// Remote source served over HTTP(S)
pub struct HttpRemoteSource {
    client: reqwest::Client,
    base_url: String,
    files: Vec<String>,
    username: Option<String>,
    password: Option<String>,
    parallelism: usize,
}

impl HttpRemoteSource {
    pub fn new(config: &RemoteConfig) -> Result<Self, SyncError> {
        for name in &config.files {
            validate_file_name(name)?;
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            files: config.files.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            parallelism: config.parallelism.max(1),
        })
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    async fn head_file(&self, name: &str) -> Result<FileMetadata, SyncError> {
        let url = self.file_url(name);
        let resp = self
            .request(Method::HEAD, &url)
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("HEAD {} failed: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(SyncError::Remote(format!(
                "HEAD {} returned {}",
                url,
                resp.status()
            )));
        }

        let headers = resp.headers();
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let modified = headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);
        let fingerprint = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(FileMetadata {
            name: name.to_string(),
            size,
            modified,
            fingerprint,
        })
    }

    async fn download_file(
        &self,
        file: &FileMetadata,
        dest_dir: &Path,
    ) -> Result<PathBuf, SyncError> {
        validate_file_name(&file.name)?;
        let url = self.file_url(&file.name);
        let started = Instant::now();

        let resp = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("GET {} failed: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(SyncError::Remote(format!(
                "GET {} returned {}",
                url,
                resp.status()
            )));
        }

        let final_path = dest_dir.join(&file.name);
        let part_path = dest_dir.join(format!("{}.part", file.name));
        let written = match write_part(resp, file, &part_path).await {
            Ok(written) => written,
            Err(e) => {
                discard_part(&part_path).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&part_path, &final_path).await {
            discard_part(&part_path).await;
            return Err(e.into());
        }

        tracing::info!(
            file = %file.name,
            bytes = written,
            duration_ms = started.elapsed().as_millis() as u64,
            "Downloaded remote file"
        );
        Ok(final_path)
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn list_files(&self) -> Result<Vec<FileMetadata>, SyncError> {
        let mut listing = Vec::with_capacity(self.files.len());
        for name in &self.files {
            listing.push(self.head_file(name).await?);
        }
        tracing::debug!(files = listing.len(), "Remote listing completed");
        Ok(listing)
    }

    async fn download_files(
        &self,
        files: &[FileMetadata],
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, SyncError> {
        tokio::fs::create_dir_all(dest_dir).await?;

        // Collected first: a borrowing closure on the stream loses the Send bound
        let pending: Vec<_> = files
            .iter()
            .map(|file| self.download_file(file, dest_dir))
            .collect();
        let transfers = futures::stream::iter(pending)
            .buffer_unordered(self.parallelism)
            .try_collect::<Vec<PathBuf>>();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = transfers => Some(result),
        };
        // Transfers still in flight were dropped mid-write
        let mut paths = match outcome {
            Some(Ok(paths)) => paths,
            Some(Err(e)) => {
                discard_partial_downloads(dest_dir).await;
                return Err(e);
            }
            None => {
                discard_partial_downloads(dest_dir).await;
                return Err(SyncError::Stopped);
            }
        };
        paths.sort();
        Ok(paths)
    }

    async fn test_connection(&self) -> Result<(), SyncError> {
        let resp = self
            .request(Method::HEAD, &self.base_url)
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("{} unreachable: {}", self.base_url, e)))?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::Remote(format!(
                "{} rejected credentials ({})",
                self.base_url,
                resp.status()
            ))),
            status if status.is_server_error() => Err(SyncError::Remote(format!(
                "{} returned {}",
                self.base_url, status
            ))),
            status => {
                tracing::debug!(status = %status, "Remote connection test passed");
                Ok(())
            }
        }
    }
}

/// Stream the response body into `part_path`, checking the announced size
async fn write_part(
    resp: reqwest::Response,
    file: &FileMetadata,
    part_path: &Path,
) -> Result<u64, SyncError> {
    let mut out = tokio::fs::File::create(part_path).await?;
    let mut stream = resp.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| SyncError::Remote(format!("transfer of {} failed: {}", file.name, e)))?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;

    if file.size > 0 && written != file.size {
        return Err(SyncError::Remote(format!(
            "{} truncated: received {} of {} bytes",
            file.name, written, file.size
        )));
    }
    Ok(written)
}

async fn discard_part(part_path: &Path) {
    match tokio::fs::remove_file(part_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %part_path.display(),
            error = %e,
            "Could not remove partial download"
        ),
    }
}

/// Remove `*.part` files left by transfers dropped on cancellation
async fn discard_partial_downloads(dest_dir: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(dest_dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().ends_with(".part") {
            discard_part(&entry.path()).await;
        }
    }
}

/// Remote names become local file names; refuse anything that could escape the staging area
fn validate_file_name(name: &str) -> Result<(), SyncError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if invalid {
        return Err(SyncError::Remote(format!("invalid remote file name '{}'", name)));
    }
    Ok(())
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
