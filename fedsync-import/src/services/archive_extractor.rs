//! Archive extraction and dump discovery
//!
//! Supported payloads, by file name:
//! - `.tar.gz` / `.tgz` / `.tar`: unpacked
//! - `.gz`: decompressed to a single file
//! - anything else: copied through unchanged
//!
//! Each archive is extracted into its own sub-directory of the destination
//! so identically named members of different archives never collide.
//!
//! Dumps are found by name only: `<database>.sql` or `<database>_dump.sql`
//! (case-insensitive) for a configured database. Everything else in the
//! extraction tree is ignored.

use crate::error::SyncError;
use flate2::read::GzDecoder;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extracted files per archive
pub type ExtractionResult = BTreeMap<PathBuf, Vec<PathBuf>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    Tar,
    Gzip,
    Plain,
}

impl ArchiveKind {
    fn detect(file_name: &str) -> (Self, &str) {
        let lower = file_name.to_ascii_lowercase();
        for (suffix, kind) in [
            (".tar.gz", ArchiveKind::TarGz),
            (".tgz", ArchiveKind::TarGz),
            (".tar", ArchiveKind::Tar),
            (".gz", ArchiveKind::Gzip),
        ] {
            if lower.ends_with(suffix) && lower.len() > suffix.len() {
                return (kind, &file_name[..file_name.len() - suffix.len()]);
            }
        }
        (ArchiveKind::Plain, file_name)
    }
}

/// Decompresses staged archives and locates database dumps
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    /// (lower-case name, configured name)
    databases: Vec<(String, String)>,
}

impl ArchiveExtractor {
    pub fn new<I, S>(database_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let databases = database_names
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.to_ascii_lowercase(), name)
            })
            .collect();
        Self { databases }
    }

    /// Extract every archive into `dest_dir`
    pub async fn extract_files(
        &self,
        archives: &[PathBuf],
        dest_dir: &Path,
    ) -> Result<ExtractionResult, SyncError> {
        let archives = archives.to_vec();
        let dest_dir = dest_dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mut extracted = ExtractionResult::new();
            for archive in archives {
                let files = extract_one(&archive, &dest_dir)?;
                tracing::debug!(
                    archive = %archive.display(),
                    files = files.len(),
                    "Archive extracted"
                );
                extracted.insert(archive, files);
            }
            Ok(extracted)
        })
        .await
        .map_err(|e| SyncError::Archive(format!("extraction task failed: {}", e)))?
    }

    /// Map configured database names to dump files found under `dir`
    pub async fn find_database_dumps(
        &self,
        dir: &Path,
    ) -> Result<BTreeMap<String, PathBuf>, SyncError> {
        let dir = dir.to_path_buf();
        let databases = self.databases.clone();
        tokio::task::spawn_blocking(move || scan_for_dumps(&dir, &databases))
            .await
            .map_err(|e| SyncError::Archive(format!("dump discovery task failed: {}", e)))?
    }
}

fn extract_one(archive: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let file_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SyncError::Archive(format!("{} has no file name", archive.display())))?;

    let (kind, stem) = ArchiveKind::detect(file_name);
    let target_dir = dest_dir.join(stem);
    std::fs::create_dir_all(&target_dir)?;

    let context = |e: std::io::Error| SyncError::Archive(format!("{}: {}", archive.display(), e));

    let mut files = match kind {
        ArchiveKind::TarGz => {
            let reader = GzDecoder::new(BufReader::new(File::open(archive)?));
            unpack_tar(tar::Archive::new(reader), &target_dir).map_err(context)?
        }
        ArchiveKind::Tar => {
            let reader = BufReader::new(File::open(archive)?);
            unpack_tar(tar::Archive::new(reader), &target_dir).map_err(context)?
        }
        ArchiveKind::Gzip => {
            let mut reader = GzDecoder::new(BufReader::new(File::open(archive)?));
            let out_path = target_dir.join(stem);
            let mut out = File::create(&out_path)?;
            std::io::copy(&mut reader, &mut out).map_err(context)?;
            vec![out_path]
        }
        ArchiveKind::Plain => {
            let out_path = target_dir.join(file_name);
            std::fs::copy(archive, &out_path)?;
            vec![out_path]
        }
    };

    files.sort();
    Ok(files)
}

fn unpack_tar<R: std::io::Read>(
    mut archive: tar::Archive<R>,
    target_dir: &Path,
) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let is_file = entry.header().entry_type().is_file();
        let relative = entry.path()?.into_owned();

        // unpack_in refuses members that would land outside target_dir
        if !entry.unpack_in(target_dir)? {
            tracing::warn!(member = %relative.display(), "Skipping archive member outside extraction directory");
            continue;
        }
        if is_file {
            files.push(target_dir.join(relative));
        }
    }
    Ok(files)
}

fn scan_for_dumps(
    dir: &Path,
    databases: &[(String, String)],
) -> Result<BTreeMap<String, PathBuf>, SyncError> {
    if !dir.is_dir() {
        return Err(SyncError::Archive(format!(
            "extraction directory {} does not exist",
            dir.display()
        )));
    }

    let mut dumps: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| SyncError::Archive(format!("walk {}: {}", dir.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(database) = entry
            .file_name()
            .to_str()
            .and_then(|name| match_dump_name(name, databases))
        else {
            continue;
        };

        match dumps.entry(database) {
            Entry::Occupied(existing) => tracing::warn!(
                database = %existing.key(),
                kept = %existing.get().display(),
                ignored = %entry.path().display(),
                "Multiple dumps found for database, keeping the first"
            ),
            Entry::Vacant(slot) => {
                slot.insert(entry.into_path());
            }
        }
    }
    Ok(dumps)
}

/// Configured database name a dump file name belongs to, if any
fn match_dump_name(file_name: &str, databases: &[(String, String)]) -> Option<String> {
    let lower = file_name.to_ascii_lowercase();
    let stem = lower.strip_suffix(".sql")?;
    let stem = stem.strip_suffix("_dump").unwrap_or(stem);
    databases
        .iter()
        .find(|(lower_name, _)| lower_name == stem)
        .map(|(_, name)| name.clone())
}
