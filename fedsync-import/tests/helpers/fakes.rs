//! In-memory collaborators for coordinator tests

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fedsync_import::config::ImportConfig;
use fedsync_import::error::SyncError;
use fedsync_import::models::{FileMetadata, ImportSummary};
use fedsync_import::services::{
    CacheService, Collaborators, CompletionListener, DatabaseImporter, LoadSensor, RemoteSource,
    SqliteDatabaseImporter, SyncCoordinator,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Remote source serving payloads from memory
pub struct FakeRemote {
    payloads: Mutex<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
    list_delay: Mutex<Duration>,
    fail_download: AtomicBool,
    pub list_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub reachable: AtomicBool,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(BTreeMap::new()),
            list_delay: Mutex::new(Duration::ZERO),
            fail_download: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            reachable: AtomicBool::new(true),
        })
    }

    /// Publish `content` under `name`, modified on the given March day
    pub fn publish(&self, name: &str, content: Vec<u8>, day: u32) {
        let modified = Utc.with_ymd_and_hms(2026, 3, day, 2, 0, 0).unwrap();
        self.payloads
            .lock()
            .unwrap()
            .insert(name.to_string(), (content, modified));
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub fn fail_downloads(&self) {
        self.fail_download.store(true, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn list_files(&self) -> Result<Vec<FileMetadata>, SyncError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let payloads = self.payloads.lock().unwrap();
        Ok(payloads
            .iter()
            .map(|(name, (content, modified))| FileMetadata {
                name: name.clone(),
                size: content.len() as u64,
                modified: Some(*modified),
                fingerprint: None,
            })
            .collect())
    }

    async fn download_files(
        &self,
        files: &[FileMetadata],
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, SyncError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(SyncError::Stopped);
        }
        if self.fail_download.load(Ordering::SeqCst) {
            return Err(SyncError::Remote("connection reset by peer".to_string()));
        }

        let payloads = self.payloads.lock().unwrap().clone();
        let mut paths = Vec::new();
        for file in files {
            let (content, _) = payloads
                .get(&file.name)
                .ok_or_else(|| SyncError::Remote(format!("{} not found", file.name)))?;
            let path = dest_dir.join(&file.name);
            std::fs::write(&path, content)?;
            paths.push(path);
        }
        Ok(paths)
    }

    async fn test_connection(&self) -> Result<(), SyncError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::Remote("remote.invalid unreachable".to_string()))
        }
    }
}

/// Cache service counting flushes
#[derive(Default)]
pub struct CountingCache {
    pub flushes: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheService for CountingCache {
    async fn flush_all(&self, _cancel: &CancellationToken) -> Result<(), SyncError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::Cache("query service returned 500".to_string()));
        }
        Ok(())
    }
}

/// Real SQLite importer that also records which databases it was asked for
pub struct RecordingImporter {
    inner: SqliteDatabaseImporter,
    pub calls: Mutex<Vec<String>>,
}

impl RecordingImporter {
    pub fn new(config: &ImportConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteDatabaseImporter::new(config.databases.clone()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatabaseImporter for RecordingImporter {
    async fn import_database(&self, database: &str, dump: &Path) -> Result<(), SyncError> {
        self.calls.lock().unwrap().push(database.to_string());
        self.inner.import_database(database, dump).await
    }
}

/// Importer whose driver crashes on the first database
pub struct PanickingImporter;

#[async_trait]
impl DatabaseImporter for PanickingImporter {
    async fn import_database(&self, database: &str, _dump: &Path) -> Result<(), SyncError> {
        panic!("sqlite driver crashed while importing {}", database);
    }
}

/// Listener counting notifications
#[derive(Default)]
pub struct CountingListener {
    pub calls: AtomicUsize,
    pub last_summary: Mutex<Option<ImportSummary>>,
}

impl CountingListener {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionListener for CountingListener {
    fn name(&self) -> &str {
        "counting"
    }

    async fn on_import_completed(&self, summary: &ImportSummary) {
        *self.last_summary.lock().unwrap() = Some(summary.clone());
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Listener that always panics
pub struct PanickingListener;

#[async_trait]
impl CompletionListener for PanickingListener {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn on_import_completed(&self, _summary: &ImportSummary) {
        panic!("search index rebuild exploded");
    }
}

/// Load sensor answering from a script, then staying at the last answer
pub struct ScriptedSensor {
    answers: Vec<bool>,
    pub checks: AtomicUsize,
}

impl ScriptedSensor {
    pub fn new(answers: Vec<bool>) -> Arc<Self> {
        Arc::new(Self {
            answers,
            checks: AtomicUsize::new(0),
        })
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl LoadSensor for ScriptedSensor {
    fn is_overloaded(&self) -> bool {
        let index = self.checks.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(index)
            .or(self.answers.last())
            .copied()
            .unwrap_or(false)
    }
}

/// Everything a coordinator test needs to inspect
pub struct Harness {
    pub coordinator: Arc<SyncCoordinator>,
    pub remote: Arc<FakeRemote>,
    pub importer: Arc<RecordingImporter>,
    pub cache: Arc<CountingCache>,
    pub config: ImportConfig,
}

impl Harness {
    pub fn new(config: ImportConfig, load_sensor: Option<Arc<dyn LoadSensor>>) -> Self {
        let remote = FakeRemote::new();
        let importer = RecordingImporter::new(&config);
        let cache = CountingCache::new();

        let coordinator = Arc::new(SyncCoordinator::new(
            config.clone(),
            Collaborators {
                remote: remote.clone(),
                importer: importer.clone(),
                cache: cache.clone(),
                load_sensor,
            },
        ));

        Self {
            coordinator,
            remote,
            importer,
            cache,
            config,
        }
    }
}
