//! Service configuration loading tests
//!
//! Tests touching FEDSYNC_* environment variables are marked #[serial] so
//! they never observe each other's overrides.

use fedsync_import::config::{
    ServiceConfig, ENV_ENABLED, ENV_REMOTE_PASSWORD, ENV_REMOTE_URL, ENV_REMOTE_USERNAME,
    ENV_SCHEDULE, ENV_STAGING_DIR,
};
use fedsync_common::config::ConfigSource;
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
[server]
bind = "0.0.0.0:8080"

[logging]
level = "debug"

[import]
enabled = true
schedule = "0 30 2 * * *"
staging_dir = "/var/lib/fedsync/staging"
cleanup_on_success = false
log_capacity = 1000

[import.remote]
base_url = "https://exports.federation.example/data"
files = ["players.tar.gz", "clubs.tar.gz"]
username = "sync"
parallelism = 4

[import.freshness]
skip_if_not_newer = false
record_path = "/var/lib/fedsync/last_import.json"

[import.backpressure]
delay_secs = 30
max_attempts = 10

[import.databases]
players = "/var/lib/fedsync/players.db"
clubs = "/var/lib/fedsync/clubs.db"

[import.cache]
flush_url = "http://127.0.0.1:5791/cache/flush"
"#;

fn clear_env() {
    for name in [
        ENV_ENABLED,
        ENV_SCHEDULE,
        ENV_REMOTE_URL,
        ENV_REMOTE_USERNAME,
        ENV_REMOTE_PASSWORD,
        ENV_STAGING_DIR,
    ] {
        std::env::remove_var(name);
    }
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("fedsync-import.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_full_file_is_loaded() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, FULL_CONFIG);

    let config = ServiceConfig::load(Some(path.as_path())).unwrap();

    assert_eq!(config.source, ConfigSource::File(path.clone()));
    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(config.logging.level, "debug");
    let import = &config.import;
    assert!(import.enabled);
    assert_eq!(import.schedule, "0 30 2 * * *");
    assert!(!import.cleanup_on_success);
    assert_eq!(import.log_capacity, 1000);
    assert_eq!(import.remote.files.len(), 2);
    assert_eq!(import.remote.parallelism, 4);
    assert_eq!(import.remote.timeout_secs, 300);
    assert!(import.freshness.enabled);
    assert!(!import.freshness.skip_if_not_newer);
    assert_eq!(import.backpressure.max_attempts, 10);
    assert!(import.backpressure.enabled);
    assert_eq!(import.databases.len(), 2);
    assert_eq!(
        import.cache.flush_url.as_deref(),
        Some("http://127.0.0.1:5791/cache/flush")
    );
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, FULL_CONFIG);

    std::env::set_var(ENV_ENABLED, "false");
    std::env::set_var(ENV_SCHEDULE, "0 0 4 * * *");
    std::env::set_var(ENV_REMOTE_URL, "https://mirror.federation.example");
    std::env::set_var(ENV_REMOTE_PASSWORD, "from-env");
    std::env::set_var(ENV_STAGING_DIR, "/tmp/fedsync-staging");

    let config = ServiceConfig::load(Some(path.as_path())).unwrap();
    clear_env();

    assert!(!config.import.enabled);
    assert_eq!(config.import.schedule, "0 0 4 * * *");
    assert_eq!(config.import.remote.base_url, "https://mirror.federation.example");
    assert_eq!(config.import.remote.username.as_deref(), Some("sync"));
    assert_eq!(config.import.remote.password.as_deref(), Some("from-env"));
    assert_eq!(config.import.staging_dir, PathBuf::from("/tmp/fedsync-staging"));
}

#[test]
#[serial]
fn test_invalid_boolean_in_environment_rejected() {
    clear_env();
    std::env::set_var(ENV_ENABLED, "sometimes");
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, "");

    let result = ServiceConfig::load(Some(path.as_path()));
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_enabled_without_remote_fails_validation() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, "[import]\nenabled = true\n");

    let err = ServiceConfig::load(Some(path.as_path())).unwrap_err();
    assert!(err.to_string().contains("base_url"));
}

#[test]
#[serial]
fn test_empty_file_gives_disabled_defaults() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, "");

    let config = ServiceConfig::load(Some(path.as_path())).unwrap();
    assert!(!config.import.enabled);
    assert_eq!(config.import.schedule, "0 0 3 * * *");
    assert_eq!(config.import.log_capacity, 500);
    assert_eq!(config.server.bind, "127.0.0.1:5790");
}

#[test]
#[serial]
fn test_effective_config_round_trips_through_toml() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, FULL_CONFIG);
    let config = ServiceConfig::load(Some(path.as_path())).unwrap();

    let written = temp_dir.path().join("out").join("effective.toml");
    fedsync_common::config::write_toml_config(&config, &written).unwrap();
    let reloaded = ServiceConfig::load(Some(written.as_path())).unwrap();

    let content = std::fs::read_to_string(&written).unwrap();
    assert!(!content.contains("source"));
    assert_eq!(reloaded.source, ConfigSource::File(written.clone()));

    assert_eq!(reloaded.import.databases, config.import.databases);
    assert_eq!(reloaded.import.remote.files, config.import.remote.files);
    assert_eq!(reloaded.import.schedule, config.import.schedule);
}
