//! Bootstrap configuration loading and config file resolution
//!
//! Config file resolution priority:
//! 1. Explicit path (command-line argument or environment variable)
//! 2. User config: `~/.config/fedsync/<module>.toml`
//! 3. System config: `/etc/fedsync/<module>.toml`
//! 4. Compiled defaults (no file)
//!
//! A missing config file is not fatal: the service starts with compiled
//! defaults and reports the [`ConfigSource`] once logging is up. A config file that exists but cannot be
//! parsed is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// HTTP server bootstrap settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5790".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locates the TOML config file of a module
pub struct ConfigLocator {
    module_name: String,
}

impl ConfigLocator {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
        }
    }

    /// Candidate config file paths in priority order (explicit path excluded)
    pub fn candidates(&self) -> Vec<PathBuf> {
        let file_name = format!("{}.toml", self.module_name);
        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("fedsync").join(&file_name));
        }
        if cfg!(unix) {
            paths.push(PathBuf::from("/etc/fedsync").join(&file_name));
        }
        paths
    }

    /// Resolve the config file to load
    ///
    /// An explicit path is returned as-is, even when it does not exist, so
    /// that loading reports the operator's typo instead of silently falling
    /// back to defaults.
    pub fn locate(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        self.candidates().into_iter().find(|p| p.exists())
    }
}

/// Load and parse a TOML config file
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Read config {} failed: {}", path.display(), e))
    })?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config {} failed: {}", path.display(), e)))
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    #[default]
    Defaults,
}

impl ConfigSource {
    pub fn from_located(path: Option<&Path>) -> Self {
        path.map_or(ConfigSource::Defaults, |p| ConfigSource::File(p.to_path_buf()))
    }

    /// Report the source; call after the tracing subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Configuration loaded from {}", path.display()),
            ConfigSource::Defaults => {
                warn!("No configuration file found, using compiled defaults")
            }
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("compiled defaults"),
        }
    }
}

/// Load a config file if one was located, otherwise fall back to defaults
pub fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => load_toml_config(path),
        None => Ok(T::default()),
    }
}

/// Write a config value as TOML
///
/// Writes to a sibling temporary file first and renames it over the target,
/// so readers never observe a half-written file.
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// OS-dependent default data directory for a module's working files
pub fn default_data_dir(module_name: &str) -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fedsync").join(module_name))
        .unwrap_or_else(|| PathBuf::from("./fedsync_data").join(module_name))
}
