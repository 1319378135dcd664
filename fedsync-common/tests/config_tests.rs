//! Tests for bootstrap configuration loading and graceful degradation
//!
//! - Missing config files fall back to compiled defaults
//! - Existing but malformed config files are reported as errors
//! - Written config files round-trip and never leave temporary files behind

use fedsync_common::config::{
    load_or_default, load_toml_config, write_toml_config, LoggingConfig, ServerConfig,
};
use fedsync_common::Error;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct BootstrapConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
fn test_missing_file_uses_defaults() {
    let config: BootstrapConfig = load_or_default(None).unwrap();
    assert_eq!(config, BootstrapConfig::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("partial.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

    let config: BootstrapConfig = load_or_default(Some(path.as_path())).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.server, ServerConfig::default());
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[server\nbind = ").unwrap();

    let result: Result<BootstrapConfig, Error> = load_toml_config(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_explicit_missing_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let result: Result<BootstrapConfig, Error> = load_or_default(Some(path.as_path()));
    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("does-not-exist.toml")),
        other => panic!("Expected config error, got {:?}", other),
    }
}

#[test]
fn test_write_then_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("fedsync-import.toml");

    let config = BootstrapConfig {
        server: ServerConfig {
            bind: "0.0.0.0:8080".to_string(),
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
        },
    };
    write_toml_config(&config, &path).unwrap();

    let loaded: BootstrapConfig = load_toml_config(&path).unwrap();
    assert_eq!(loaded, config);

    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
        .collect();
    assert!(leftovers.is_empty(), "temporary file should be renamed away");
}
