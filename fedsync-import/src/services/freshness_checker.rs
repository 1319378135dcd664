//! Freshness check
//!
//! Compares the remote listing against the metadata persisted after the
//! last successful import. The comparison is deterministic: files are
//! visited in name order and the first difference found decides.
//!
//! Precedence per file:
//! 1. Missing from the record → new file
//! 2. Both fingerprints known → fingerprint decides
//! 3. Size differs → changed
//! 4. Remote modification time later than recorded (or newly reported) → changed

use crate::error::SyncError;
use crate::models::{FileMetadata, FreshnessDecision, FreshnessRecord, FRESHNESS_RECORD_VERSION};
use std::path::{Path, PathBuf};

/// Persisted record of the last successful import (JSON file)
#[derive(Debug, Clone)]
pub struct FreshnessStore {
    path: PathBuf,
}

impl FreshnessStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record; `Ok(None)` when no import has been recorded yet
    pub async fn load(&self) -> Result<Option<FreshnessRecord>, SyncError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::Freshness(format!(
                    "read {} failed: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let record: FreshnessRecord = serde_json::from_str(&content).map_err(|e| {
            SyncError::Freshness(format!("{} is corrupt: {}", self.path.display(), e))
        })?;

        if record.version != FRESHNESS_RECORD_VERSION {
            return Err(SyncError::Freshness(format!(
                "{} has unsupported version {} (expected {})",
                self.path.display(),
                record.version,
                FRESHNESS_RECORD_VERSION
            )));
        }

        Ok(Some(record))
    }

    /// Replace the record (temporary file + rename)
    pub async fn save(&self, record: &FreshnessRecord) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_vec_pretty(record)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

/// Decides whether the remote data warrants an import
#[derive(Debug, Clone)]
pub struct FreshnessChecker {
    store: FreshnessStore,
}

impl FreshnessChecker {
    pub fn new(store: FreshnessStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &FreshnessStore {
        &self.store
    }

    /// Compare the remote listing with the persisted record
    pub async fn check(&self, remote: &[FileMetadata]) -> Result<FreshnessDecision, SyncError> {
        let previous = self.store.load().await?;
        Ok(compare(remote, previous.as_ref()))
    }

    /// Persist the listing of a fully successful import
    pub async fn record_success(&self, remote: &[FileMetadata]) -> Result<(), SyncError> {
        self.store.save(&FreshnessRecord::new(remote.to_vec())).await
    }
}

/// Pure comparison of a listing against the previous record
pub fn compare(remote: &[FileMetadata], previous: Option<&FreshnessRecord>) -> FreshnessDecision {
    let previous = match previous {
        Some(record) if !record.files.is_empty() => record,
        _ => return FreshnessDecision::import("no previous import recorded"),
    };

    if remote.is_empty() {
        return FreshnessDecision::skip("remote source lists no files");
    }

    if remote.len() != previous.files.len() {
        return FreshnessDecision::import(format!(
            "remote file count changed ({} -> {})",
            previous.files.len(),
            remote.len()
        ));
    }

    let mut ordered: Vec<&FileMetadata> = remote.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    for file in ordered {
        let Some(seen) = previous.find(&file.name) else {
            return FreshnessDecision::import(format!("new remote file {}", file.name));
        };

        if let (Some(now), Some(before)) = (&file.fingerprint, &seen.fingerprint) {
            if now != before {
                return FreshnessDecision::import(format!("{} content changed", file.name));
            }
            continue;
        }

        if file.size != seen.size {
            return FreshnessDecision::import(format!(
                "{} size changed ({} -> {} bytes)",
                file.name, seen.size, file.size
            ));
        }

        match (file.modified, seen.modified) {
            (Some(now), Some(before)) if now > before => {
                return FreshnessDecision::import(format!(
                    "{} modified at {} (last import saw {})",
                    file.name,
                    now.to_rfc3339(),
                    before.to_rfc3339()
                ));
            }
            (Some(now), None) => {
                return FreshnessDecision::import(format!(
                    "{} now reports modification time {}",
                    file.name,
                    now.to_rfc3339()
                ));
            }
            _ => {}
        }
    }

    FreshnessDecision::skip(format!(
        "remote data not newer than last import at {}",
        previous.imported_at.to_rfc3339()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn file(name: &str, size: u64, day: u32) -> FileMetadata {
        FileMetadata {
            name: name.to_string(),
            size,
            modified: Some(Utc.with_ymd_and_hms(2026, 3, day, 4, 0, 0).unwrap()),
            fingerprint: None,
        }
    }

    fn record(files: Vec<FileMetadata>) -> FreshnessRecord {
        FreshnessRecord::new(files)
    }

    #[test]
    fn test_empty_record_always_imports() {
        let empty = record(vec![]);
        assert!(compare(&[], None).should_import);
        assert!(compare(&[], Some(&empty)).should_import);
        assert!(compare(&[file("players.tar.gz", 10, 1)], Some(&empty)).should_import);
    }

    #[test]
    fn test_identical_listing_is_not_newer() {
        let listing = vec![file("players.tar.gz", 10, 1), file("clubs.tar.gz", 20, 1)];
        let decision = compare(&listing, Some(&record(listing.clone())));
        assert!(!decision.should_import);
        assert!(decision.reason.contains("not newer"));
    }

    #[test]
    fn test_order_of_listing_does_not_matter() {
        let listing = vec![file("players.tar.gz", 10, 1), file("clubs.tar.gz", 20, 1)];
        let reversed: Vec<_> = listing.iter().rev().cloned().collect();
        let previous = record(reversed.clone());
        assert_eq!(compare(&listing, Some(&previous)), compare(&reversed, Some(&previous)));
        assert!(!compare(&listing, Some(&previous)).should_import);

        // With several changed files the reported one does not depend on order
        let changed = vec![file("players.tar.gz", 11, 1), file("clubs.tar.gz", 21, 1)];
        let changed_reversed: Vec<_> = changed.iter().rev().cloned().collect();
        let decision = compare(&changed, Some(&previous));
        assert_eq!(decision, compare(&changed_reversed, Some(&previous)));
        assert!(decision.reason.starts_with("clubs.tar.gz"));
    }

    #[test]
    fn test_size_change_triggers_import() {
        let previous = record(vec![file("players.tar.gz", 10, 1)]);
        let decision = compare(&[file("players.tar.gz", 11, 1)], Some(&previous));
        assert!(decision.should_import);
        assert!(decision.reason.contains("size changed"));
    }

    #[test]
    fn test_newer_modification_time_triggers_import() {
        let previous = record(vec![file("players.tar.gz", 10, 1)]);
        let decision = compare(&[file("players.tar.gz", 10, 2)], Some(&previous));
        assert!(decision.should_import);

        let older = compare(&[file("players.tar.gz", 10, 1)], Some(&record(vec![file("players.tar.gz", 10, 2)])));
        assert!(!older.should_import);
    }

    #[test]
    fn test_new_file_and_count_change() {
        let previous = record(vec![file("players.tar.gz", 10, 1)]);
        let added = compare(
            &[file("players.tar.gz", 10, 1), file("clubs.tar.gz", 5, 1)],
            Some(&previous),
        );
        assert!(added.should_import);
        assert!(added.reason.contains("count changed"));

        let renamed = compare(&[file("players-v2.tar.gz", 10, 1)], Some(&previous));
        assert!(renamed.should_import);
        assert!(renamed.reason.contains("new remote file"));
    }

    #[test]
    fn test_matching_fingerprint_wins_over_timestamp() {
        let mut before = file("players.tar.gz", 10, 1);
        before.fingerprint = Some("\"abc\"".to_string());
        let mut now = file("players.tar.gz", 10, 5);
        now.fingerprint = Some("\"abc\"".to_string());
        assert!(!compare(&[now.clone()], Some(&record(vec![before.clone()]))).should_import);

        now.fingerprint = Some("\"def\"".to_string());
        assert!(compare(&[now], Some(&record(vec![before]))).should_import);
    }

    #[tokio::test]
    async fn test_store_round_trip_and_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FreshnessStore::new(temp_dir.path().join("state").join("last_import.json"));
        assert!(store.load().await.unwrap().is_none());

        let saved = FreshnessRecord {
            version: FRESHNESS_RECORD_VERSION,
            imported_at: Utc::now() - Duration::hours(1),
            files: vec![file("players.tar.gz", 10, 1)],
        };
        store.save(&saved).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_store_rejects_corrupt_and_unknown_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("last_import.json");
        let store = FreshnessStore::new(&path);

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(store.load().await, Err(SyncError::Freshness(_))));

        std::fs::write(
            &path,
            r#"{"version": 99, "imported_at": "2026-03-01T00:00:00Z", "files": []}"#,
        )
        .unwrap();
        assert!(matches!(store.load().await, Err(SyncError::Freshness(_))));
    }

    #[tokio::test]
    async fn test_checker_first_run_imports() {
        let temp_dir = TempDir::new().unwrap();
        let checker = FreshnessChecker::new(FreshnessStore::new(temp_dir.path().join("none.json")));
        let decision = checker.check(&[file("players.tar.gz", 10, 1)]).await.unwrap();
        assert!(decision.should_import);

        checker.record_success(&[file("players.tar.gz", 10, 1)]).await.unwrap();
        let decision = checker.check(&[file("players.tar.gz", 10, 1)]).await.unwrap();
        assert!(!decision.should_import);
    }
}
