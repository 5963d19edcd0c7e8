//! Global options and the state shared by every command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use docsync_cache::{pool::DatabasePool, SqliteStateStore};
use docsync_core::config::{Config, ConfigBuilder};
use docsync_remote::HttpRemoteConnector;
use docsync_sync::Controller;

use crate::output::OutputFormat;

/// Options accepted before or after any command
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Directory holding the database, the pid file and the logs
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Use alternate config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log file level
    #[arg(long, global = true)]
    pub log_level_file: Option<String>,

    /// Console log level
    #[arg(long, global = true)]
    pub log_level_console: Option<String>,

    /// Debug mode: stop on the first error and log debug to the console
    #[arg(long, global = true)]
    pub debug: bool,

    /// Raise per-pair failures instead of recording them
    #[arg(long, global = true)]
    pub stop_on_error: bool,

    /// Seconds between two synchronization cycles
    #[arg(long, global = true)]
    pub delay: Option<u64>,

    /// Maximum number of operations per root and cycle
    #[arg(long, global = true)]
    pub max_sync_step: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Connect timeout in seconds
    #[arg(long, global = true)]
    pub handshake_timeout: Option<u64>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose console output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl GlobalArgs {
    /// Loads the configuration file and applies the flags on top
    pub fn config(&self) -> Result<Config> {
        let path = self.config.clone().unwrap_or_else(Config::default_path);
        let loaded = if self.config.is_some() {
            Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        } else {
            Config::load_or_default(&path)
        };
        self.apply(loaded)
    }

    fn apply(&self, config: Config) -> Result<Config> {
        let mut builder = ConfigBuilder::from_config(config);

        if let Some(home) = &self.home {
            builder = builder.home(home.clone());
        }
        if let Some(level) = &self.log_level_file {
            builder = builder.logging_file_level(level.as_str());
        }
        if let Some(level) = self.console_level() {
            builder = builder.logging_console_level(level);
        }
        if self.debug || self.stop_on_error {
            builder = builder.sync_stop_on_error(true);
        }
        if let Some(delay) = self.delay {
            builder = builder.sync_delay_secs(delay);
        }
        if let Some(steps) = self.max_sync_step {
            builder = builder.sync_max_sync_step(steps);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.remote_timeout_secs(timeout);
        }
        if let Some(timeout) = self.handshake_timeout {
            builder = builder.remote_handshake_timeout_secs(timeout);
        }

        builder.build_validated().map_err(|errors| {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow::anyhow!("Invalid configuration: {}", details.join("; "))
        })
    }

    /// Console level from `--debug`, `-v` or `--log-level-console`
    fn console_level(&self) -> Option<String> {
        match (self.debug, self.verbose) {
            (_, v) if v >= 2 => Some("trace".to_string()),
            (true, _) | (false, 1) => Some("debug".to_string()),
            _ => self.log_level_console.clone(),
        }
    }

    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Effective configuration and output format for one invocation
pub struct AppContext {
    pub config: Config,
    pub format: OutputFormat,
}

impl AppContext {
    pub fn new(config: Config, format: OutputFormat) -> Self {
        Self { config, format }
    }

    /// Opens the state database and builds a controller over it
    pub async fn controller(&self) -> Result<Controller> {
        let pool = DatabasePool::new(&self.config.database_path())
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteStateStore::new(pool.pool().clone()));
        let connector = Arc::new(HttpRemoteConnector::new(&self.config.remote));
        Ok(Controller::new(self.config.clone(), store, connector))
    }
}
