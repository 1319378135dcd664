//! Configuration and payload fixtures

use flate2::write::GzEncoder;
use flate2::Compression;
use fedsync_import::config::ImportConfig;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use std::path::Path;

pub const EXPORT_ARCHIVE: &str = "export.tar.gz";

pub const CLUBS_DUMP: &str = "BEGIN TRANSACTION;\n\
CREATE TABLE clubs (id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\
INSERT INTO clubs VALUES (1, 'Hastings Chess Club');\n\
INSERT INTO clubs VALUES (2, 'Marshall Chess Club');\n\
COMMIT;\n";

pub const PLAYERS_DUMP: &str = "BEGIN TRANSACTION;\n\
CREATE TABLE players (id INTEGER PRIMARY KEY, name TEXT NOT NULL, rating INTEGER);\n\
INSERT INTO players VALUES (1, 'Judit Polgar', 2675);\n\
INSERT INTO players VALUES (2, 'Hou Yifan', 2650);\n\
INSERT INTO players VALUES (3, 'Vera Menchik', 2300);\n\
COMMIT;\n";

/// Enabled import config rooted in a temporary directory
///
/// Two targets (`clubs`, `players`), one remote archive, no backpressure delay.
pub fn import_config(root: &Path) -> ImportConfig {
    let mut config = ImportConfig {
        enabled: true,
        staging_dir: root.join("staging"),
        log_capacity: 200,
        ..Default::default()
    };
    config.remote.base_url = "http://remote.invalid/exports".to_string();
    config.remote.files = vec![EXPORT_ARCHIVE.to_string()];
    config.freshness.record_path = root.join("state").join("last_import.json");
    config.backpressure.delay_secs = 0;
    config.backpressure.max_attempts = 2;
    config
        .databases
        .insert("clubs".to_string(), root.join("db").join("clubs.db"));
    config
        .databases
        .insert("players".to_string(), root.join("db").join("players.db"));
    config
}

/// In-memory `.tar.gz` with the given members
pub fn tar_gz(members: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// The regular federation export: both dumps plus an unrelated file
pub fn federation_export() -> Vec<u8> {
    tar_gz(&[
        ("export/clubs.sql", CLUBS_DUMP),
        ("export/players_dump.sql", PLAYERS_DUMP),
        ("export/README.txt", "Federation export, generated nightly"),
    ])
}

pub async fn count_rows(db: &Path, table: &str) -> i64 {
    let options = SqliteConnectOptions::new().filename(db);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(&mut conn)
        .await
        .unwrap();
    count
}
