//! Configuration module for docsync.
//!
//! The YAML file at [`Config::default_path`] maps onto [`Config`]. Missing
//! keys take their defaults; command-line flags are applied on top through
//! [`ConfigBuilder`], and [`Config::validate`] reports every bad value at once.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for docsync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the state database, the pid file and the logs.
    pub home: PathBuf,
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub ignore: IgnoreConfig,
    pub logging: LoggingConfig,
}

/// Synchronizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds to sleep between two cycles.
    pub delay_secs: u64,
    /// Maximum number of pairs applied per root and cycle.
    pub max_sync_step: usize,
    /// Failed attempts before a pair becomes `unsynchronized`.
    pub max_error_count: u32,
    /// Consecutive cycles a side must be missing before it counts as deleted.
    pub deletion_debounce_cycles: u32,
    /// Re-raise per-pair failures instead of recording them.
    pub stop_on_error: bool,
}

/// Remote server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Connect timeout, in seconds.
    pub handshake_timeout_secs: u64,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    /// Repository used when a command does not name one.
    pub default_repository: String,
}

/// Names hidden from local scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub console_level: String,
    /// Log file level.
    pub file_level: String,
    /// Path to the log file, `<home>/logs/docsync.log` when unset.
    pub file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/docsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("docsync")
            .join("config.yaml")
    }

    /// SQLite state database.
    pub fn database_path(&self) -> PathBuf {
        self.home.join("docsync.db")
    }

    /// Pid file written by the daemon.
    pub fn pid_path(&self) -> PathBuf {
        self.home.join("docsyncd.pid")
    }

    /// Log file, falling back to `<home>/logs/docsync.log`.
    pub fn log_file(&self) -> PathBuf {
        self.logging
            .file
            .clone()
            .unwrap_or_else(|| self.home.join("logs").join("docsync.log"))
    }
}

impl SyncConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl RemoteConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IgnoreConfig {
    /// Returns true if a local entry with this name must stay invisible.
    pub fn is_ignored(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.prefixes
            .iter()
            .any(|p| lower.starts_with(&p.to_lowercase()))
            || self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            home: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join(".docsync"),
            sync: SyncConfig::default(),
            remote: RemoteConfig::default(),
            ignore: IgnoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            delay_secs: 5,
            max_sync_step: 10,
            max_error_count: 3,
            deletion_debounce_cycles: 2,
            stop_on_error: false,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 60,
            timeout_secs: 20,
            default_repository: "default".to_string(),
        }
    }
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            prefixes: [".", "desktop.ini", "icon\r", "thumbs.db", "~$"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            suffixes: ["~", ".swp", ".lock", ".LOCK", ".part"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: "info".to_string(),
            file_level: "debug".to_string(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.max_sync_step"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for the logging levels.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let mut positive = |field: &str, value: u64| {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        };

        // --- sync ---
        positive("sync.max_sync_step", self.sync.max_sync_step as u64);
        positive("sync.max_error_count", u64::from(self.sync.max_error_count));
        positive(
            "sync.deletion_debounce_cycles",
            u64::from(self.sync.deletion_debounce_cycles),
        );

        // --- remote ---
        positive("remote.handshake_timeout_secs", self.remote.handshake_timeout_secs);
        positive("remote.timeout_secs", self.remote.timeout_secs);

        if self.remote.default_repository.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.default_repository".into(),
                message: "must not be empty".into(),
            });
        }

        // --- ignore ---
        if self.ignore.prefixes.iter().any(String::is_empty) {
            errors.push(ValidationError {
                field: "ignore.prefixes".into(),
                message: "an empty prefix would hide every file".into(),
            });
        }
        if self.ignore.suffixes.iter().any(String::is_empty) {
            errors.push(ValidationError {
                field: "ignore.suffixes".into(),
                message: "an empty suffix would hide every file".into(),
            });
        }

        // --- logging ---
        for (field, level) in [
            ("logging.console_level", &self.logging.console_level),
            ("logging.file_level", &self.logging.file_level),
        ] {
            if !VALID_LOG_LEVELS.contains(&level.as_str()) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!(
                        "invalid level '{}'; valid options: {}",
                        level,
                        VALID_LOG_LEVELS.join(", ")
                    ),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use docsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .home(PathBuf::from("/home/user/.docsync"))
///     .sync_delay_secs(10)
///     .logging_console_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an already loaded configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn home(mut self, home: PathBuf) -> Self {
        self.config.home = home;
        self
    }

    // --- sync ---

    pub fn sync_delay_secs(mut self, seconds: u64) -> Self {
        self.config.sync.delay_secs = seconds;
        self
    }

    pub fn sync_max_sync_step(mut self, n: usize) -> Self {
        self.config.sync.max_sync_step = n;
        self
    }

    pub fn sync_max_error_count(mut self, n: u32) -> Self {
        self.config.sync.max_error_count = n;
        self
    }

    pub fn sync_deletion_debounce_cycles(mut self, n: u32) -> Self {
        self.config.sync.deletion_debounce_cycles = n;
        self
    }

    pub fn sync_stop_on_error(mut self, stop: bool) -> Self {
        self.config.sync.stop_on_error = stop;
        self
    }

    // --- remote ---

    pub fn remote_handshake_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.remote.handshake_timeout_secs = seconds;
        self
    }

    pub fn remote_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.remote.timeout_secs = seconds;
        self
    }

    pub fn remote_default_repository(mut self, repository: impl Into<String>) -> Self {
        self.config.remote.default_repository = repository.into();
        self
    }

    // --- ignore ---

    pub fn ignore_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.config.ignore.prefixes = prefixes;
        self
    }

    pub fn ignore_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.config.ignore.suffixes = suffixes;
        self
    }

    // --- logging ---

    pub fn logging_console_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.console_level = level.into();
        self
    }

    pub fn logging_file_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.file_level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = Some(file);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
