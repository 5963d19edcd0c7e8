//! docsync Daemon - Background synchronization service
//!
//! This binary is spawned by `docsync start` and handles:
//! - Periodic synchronization of every bound root
//! - A pid file so `docsync stop` can reach it
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon opens the state store, builds a [`Controller`] and runs the
//! synchronizer loop until a `CancellationToken` is triggered by SIGTERM or
//! SIGINT. A cycle in progress stops at the next pair boundary.
//!
//! The home directory comes from the configuration file and can be
//! overridden with `DOCSYNC_HOME`.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use docsync_cache::{pool::DatabasePool, SqliteStateStore};
use docsync_core::config::Config;
use docsync_remote::HttpRemoteConnector;
use docsync_sync::Controller;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured home directory
const HOME_ENV: &str = "DOCSYNC_HOME";

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the controller and the pid file for the lifetime of the process
struct DaemonService {
    config: Config,
    controller: Controller,
    /// Token for signalling graceful shutdown
    shutdown: CancellationToken,
    /// Held for its drop, which removes the file
    _pid_file: PidFile,
}

impl DaemonService {
    /// Opens the database, claims the pid file and builds the controller
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        std::fs::create_dir_all(&config.home)
            .with_context(|| format!("Failed to create {}", config.home.display()))?;

        let pid_file = PidFile::claim(&config.pid_path())?;

        let db_pool = DatabasePool::new(&config.database_path())
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteStateStore::new(db_pool.pool().clone()));
        let connector = Arc::new(HttpRemoteConnector::new(&config.remote));
        let controller = Controller::new(config.clone(), store, connector);

        Ok(Self {
            config,
            controller,
            shutdown,
            _pid_file: pid_file,
        })
    }

    /// Runs the synchronization loop until shutdown
    async fn run(&self) -> Result<()> {
        let synchronizer = self.controller.synchronizer();

        // Forward the signal token to the synchronizer
        let shutdown = self.shutdown.clone();
        let stopper = Arc::clone(&synchronizer);
        tokio::spawn(async move {
            shutdown.cancelled().await;
            stopper.stop();
        });

        let result = synchronizer
            .run_loop(self.config.sync.delay(), self.config.sync.max_sync_step)
            .await
            .context("Synchronization loop failed");

        self.controller.dispose().await;
        result
    }
}

// ============================================================================
// Pid file
// ============================================================================

/// Pid file removed when dropped
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes this process id, refusing when another live daemon owns the file
    fn claim(path: &Path) -> Result<Self> {
        if let Some(pid) = read_pid(path) {
            if process_alive(pid) {
                anyhow::bail!(
                    "Another instance of docsyncd is already running (pid {pid}). \
                     Use 'docsync stop' to stop it first."
                );
            }
            warn!(pid, path = %path.display(), "Removing stale pid file");
        }

        std::fs::write(path, std::process::id().to_string())
            .with_context(|| format!("Failed to write pid file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove pid file");
        }
    }
}

fn read_pid(path: &Path) -> Option<i32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(pid: i32) -> bool {
    // Signal 0 only checks that the process exists
    unsafe { libc::kill(pid, 0) == 0 }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

/// Loads the configuration file and applies the home override
fn load_config() -> Config {
    let mut config = Config::load_or_default(&Config::default_path());
    if let Some(home) = std::env::var_os(HOME_ENV) {
        config.home = PathBuf::from(home);
    }
    config
}

/// Sends logs to the log file, honouring `RUST_LOG`
fn init_tracing(config: &Config) -> Result<()> {
    let log_file = config.log_file();
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config();
    init_tracing(&config)?;

    info!(home = %config.home.display(), "docsync daemon starting (docsyncd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("docsync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "docsync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
