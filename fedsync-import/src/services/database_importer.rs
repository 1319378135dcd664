//! Database dump import
//!
//! Importing a dump replaces the target database's content. Databases are
//! imported one after another in name order; a failure stops the phase and
//! reports which database failed and which ones were already replaced.
//! There is no rollback across databases.

use crate::error::SyncError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Loads dump files into target databases
#[async_trait]
pub trait DatabaseImporter: Send + Sync {
    /// Replace the content of `database` with `dump`
    async fn import_database(&self, database: &str, dump: &Path) -> Result<(), SyncError>;

    /// Import every dump in name order, returning the imported database names
    ///
    /// Stops at the first failure with [`SyncError::DatabaseImport`] listing
    /// the databases replaced before it.
    async fn import_databases(
        &self,
        dumps: &BTreeMap<String, PathBuf>,
    ) -> Result<Vec<String>, SyncError> {
        let mut imported = Vec::with_capacity(dumps.len());
        for (database, dump) in dumps {
            if let Err(e) = self.import_database(database, dump).await {
                let message = match e {
                    SyncError::DatabaseImport { message, .. } => message,
                    other => other.to_string(),
                };
                return Err(SyncError::DatabaseImport {
                    database: database.clone(),
                    imported,
                    message,
                });
            }
            imported.push(database.clone());
        }
        Ok(imported)
    }
}

/// Imports SQL dumps into SQLite database files
///
/// Each database is replaced inside one transaction: existing user tables
/// and views are dropped, then the dump script runs. A failing dump leaves
/// the previous content in place.
#[derive(Debug, Clone)]
pub struct SqliteDatabaseImporter {
    targets: BTreeMap<String, PathBuf>,
}

impl SqliteDatabaseImporter {
    /// `targets` maps database names to SQLite files
    pub fn new(targets: BTreeMap<String, PathBuf>) -> Self {
        Self { targets }
    }

    async fn replace_content(target: &Path, script: &str) -> Result<(), sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(target)
            .create_if_missing(true)
            .foreign_keys(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let result = Self::replace_in_transaction(&pool, script).await;
        pool.close().await;
        result
    }

    async fn replace_in_transaction(pool: &SqlitePool, script: &str) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing: Vec<(String, String)> = sqlx::query_as(
            "SELECT type, name FROM sqlite_master \
             WHERE type IN ('view', 'table') AND name NOT LIKE 'sqlite_%' \
             ORDER BY type DESC, name",
        )
        .fetch_all(&mut *tx)
        .await?;

        // Views first (ORDER BY type DESC), so no view outlives its table
        for (kind, name) in existing {
            let statement = format!(
                "DROP {} IF EXISTS {}",
                kind.to_ascii_uppercase(),
                quote_identifier(&name)
            );
            sqlx::query(&statement).execute(&mut *tx).await?;
        }

        // Many statements, run once; keep them out of the statement cache
        sqlx::query(script).persistent(false).execute(&mut *tx).await?;
        tx.commit().await
    }
}

#[async_trait]
impl DatabaseImporter for SqliteDatabaseImporter {
    async fn import_database(&self, database: &str, dump: &Path) -> Result<(), SyncError> {
        let fail = |message: String| SyncError::DatabaseImport {
            database: database.to_string(),
            imported: Vec::new(),
            message,
        };

        let target = self
            .targets
            .get(database)
            .ok_or_else(|| fail("no target configured for database".to_string()))?;

        let started = Instant::now();
        let content = tokio::fs::read_to_string(dump)
            .await
            .map_err(|e| fail(format!("read {} failed: {}", dump.display(), e)))?;

        let script = prepare_dump_script(&content);
        if script.trim().is_empty() {
            return Err(fail(format!("dump {} is empty", dump.display())));
        }

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| fail(format!("create {} failed: {}", parent.display(), e)))?;
            }
        }

        Self::replace_content(target, &script)
            .await
            .map_err(|e| fail(e.to_string()))?;

        tracing::info!(
            database = %database,
            target = %target.display(),
            dump_bytes = content.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Database content replaced"
        );
        Ok(())
    }
}

/// Strip transaction control lines so the dump runs inside our transaction
fn prepare_dump_script(content: &str) -> String {
    content
        .lines()
        .filter(|line| !is_transaction_control(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_transaction_control(line: &str) -> bool {
    let normalized = line
        .trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    // END on its own closes trigger bodies, only END TRANSACTION is control
    matches!(
        normalized.as_str(),
        "BEGIN"
            | "BEGIN TRANSACTION"
            | "BEGIN DEFERRED TRANSACTION"
            | "BEGIN IMMEDIATE TRANSACTION"
            | "BEGIN EXCLUSIVE TRANSACTION"
            | "COMMIT"
            | "COMMIT TRANSACTION"
            | "END TRANSACTION"
    ) && line.trim().ends_with(';')
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
