//! Configuration resolution for fedsync-import
//!
//! **Priority:** Environment → TOML → compiled defaults
//!
//! The TOML file is located by [`ConfigLocator`]; secrets (remote
//! credentials) are normally supplied through the environment.

use fedsync_common::config::{
    default_data_dir, load_or_default, ConfigLocator, ConfigSource, LoggingConfig, ServerConfig,
};
use fedsync_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Module name used for config file lookup and default data directory
pub const MODULE_NAME: &str = "fedsync-import";

pub const ENV_ENABLED: &str = "FEDSYNC_IMPORT_ENABLED";
pub const ENV_SCHEDULE: &str = "FEDSYNC_IMPORT_SCHEDULE";
pub const ENV_REMOTE_URL: &str = "FEDSYNC_REMOTE_URL";
pub const ENV_REMOTE_USERNAME: &str = "FEDSYNC_REMOTE_USERNAME";
pub const ENV_REMOTE_PASSWORD: &str = "FEDSYNC_REMOTE_PASSWORD";
pub const ENV_STAGING_DIR: &str = "FEDSYNC_STAGING_DIR";

/// Complete service configuration (one TOML file)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub import: ImportConfig,
    /// File the configuration was read from; never serialized
    #[serde(skip)]
    pub source: ConfigSource,
}

/// Import pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Six-field cron expression (seconds first)
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// Working area for downloaded and extracted files
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Delete the staging area after a successful run
    #[serde(default = "default_true")]
    pub cleanup_on_success: bool,

    /// Maximum number of retained log entries
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub freshness: FreshnessConfig,

    #[serde(default)]
    pub backpressure: BackpressureConfig,

    /// Target databases: database name → SQLite file
    #[serde(default)]
    pub databases: BTreeMap<String, PathBuf>,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Remote file server connection
#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub base_url: String,

    /// Remote file names to synchronise
    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,

    /// Concurrent file transfers
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("files", &self.files)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("parallelism", &self.parallelism)
            .finish()
    }
}

/// Freshness check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// End the run as skipped when the remote data is not newer
    #[serde(default = "default_true")]
    pub skip_if_not_newer: bool,

    /// Location of the persisted record of the last successful import
    #[serde(default = "default_record_path")]
    pub record_path: PathBuf,
}

/// Load-based deferral of scheduled runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackpressureConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Wait between load checks
    #[serde(default = "default_backpressure_delay_secs")]
    pub delay_secs: u64,

    /// Re-checks after the first overloaded reading
    #[serde(default = "default_backpressure_max_attempts")]
    pub max_attempts: u32,

    /// In-flight HTTP requests at which the service counts as overloaded
    #[serde(default = "default_max_in_flight_requests")]
    pub max_in_flight_requests: usize,
}

/// Read-side cache invalidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Endpoint receiving a POST to flush all caches; no flush when unset
    #[serde(default)]
    pub flush_url: Option<String>,

    #[serde(default = "default_cache_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_schedule() -> String {
    "0 0 3 * * *".to_string()
}

fn default_staging_dir() -> PathBuf {
    default_data_dir(MODULE_NAME).join("staging")
}

fn default_record_path() -> PathBuf {
    default_data_dir(MODULE_NAME).join("last_import.json")
}

fn default_log_capacity() -> usize {
    500
}

fn default_remote_timeout_secs() -> u64 {
    300
}

fn default_parallelism() -> usize {
    2
}

fn default_backpressure_delay_secs() -> u64 {
    60
}

fn default_backpressure_max_attempts() -> u32 {
    5
}

fn default_max_in_flight_requests() -> usize {
    64
}

fn default_cache_timeout_secs() -> u64 {
    30
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            schedule: default_schedule(),
            staging_dir: default_staging_dir(),
            cleanup_on_success: true,
            log_capacity: default_log_capacity(),
            remote: RemoteConfig::default(),
            freshness: FreshnessConfig::default(),
            backpressure: BackpressureConfig::default(),
            databases: BTreeMap::new(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            files: Vec::new(),
            username: None,
            password: None,
            timeout_secs: default_remote_timeout_secs(),
            parallelism: default_parallelism(),
        }
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_if_not_newer: true,
            record_path: default_record_path(),
        }
    }
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: default_backpressure_delay_secs(),
            max_attempts: default_backpressure_max_attempts(),
            max_in_flight_requests: default_max_in_flight_requests(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            flush_url: None,
            timeout_secs: default_cache_timeout_secs(),
        }
    }
}

impl BackpressureConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl ImportConfig {
    /// Staging sub-directory receiving downloaded files
    pub fn download_dir(&self) -> PathBuf {
        self.staging_dir.join("download")
    }

    /// Staging sub-directory receiving extracted files
    pub fn extract_dir(&self) -> PathBuf {
        self.staging_dir.join("extract")
    }

    /// Check settings that would make every run fail
    ///
    /// A disabled import is always valid.
    pub fn validate(&self) -> Result<()> {
        if self.log_capacity == 0 {
            return Err(Error::Config("import.log_capacity must be at least 1".to_string()));
        }
        if !self.enabled {
            return Ok(());
        }
        if self.remote.base_url.trim().is_empty() {
            return Err(Error::Config(
                "import.remote.base_url is required when import is enabled".to_string(),
            ));
        }
        if self.remote.files.is_empty() {
            return Err(Error::Config(
                "import.remote.files must list at least one remote file".to_string(),
            ));
        }
        if self.databases.is_empty() {
            return Err(Error::Config(
                "import.databases must configure at least one target database".to_string(),
            ));
        }
        if self.remote.parallelism == 0 {
            return Err(Error::Config("import.remote.parallelism must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(ENV_ENABLED) {
            self.enabled = parse_bool(ENV_ENABLED, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_SCHEDULE) {
            self.schedule = value;
        }
        if let Ok(value) = std::env::var(ENV_REMOTE_URL) {
            self.remote.base_url = value;
        }
        if let Ok(value) = std::env::var(ENV_REMOTE_USERNAME) {
            self.remote.username = Some(value);
        }
        if let Ok(value) = std::env::var(ENV_REMOTE_PASSWORD) {
            self.remote.password = Some(value);
        }
        if let Ok(value) = std::env::var(ENV_STAGING_DIR) {
            self.staging_dir = PathBuf::from(value);
        }
        Ok(())
    }
}

impl ServiceConfig {
    /// Locate, load, override and validate the service configuration
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let locator = ConfigLocator::new(MODULE_NAME);
        let path = locator.locate(explicit);
        let mut config: ServiceConfig = load_or_default(path.as_deref())?;
        config.source = ConfigSource::from_located(path.as_deref());
        config.import.apply_env_overrides()?;
        config.import.validate()?;
        Ok(config)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}
