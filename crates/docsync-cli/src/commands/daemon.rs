//! Daemon management commands
//!
//! - `start` - Spawn `docsyncd` detached from the terminal
//! - `stop`  - Send SIGTERM to the pid recorded in `<home>/docsyncd.pid`
//!
//! The daemon receives the effective home through `DOCSYNC_HOME`.

use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info};

use crate::context::AppContext;
use crate::output::get_formatter;

/// Daemon binary name
const DAEMON_BINARY: &str = "docsyncd";

/// Environment variable read by the daemon for its home directory
const HOME_ENV: &str = "DOCSYNC_HOME";

// ============================================================================
// start
// ============================================================================

#[derive(Debug, Args)]
pub struct StartCommand {}

impl StartCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let pid_path = ctx.config.pid_path();

        if let Some(pid) = running_daemon(&pid_path) {
            formatter.warn(&format!("docsyncd is already running (pid {pid})"));
            return Ok(());
        }

        let binary = daemon_binary();
        info!(binary = %binary.display(), "Starting docsync daemon");

        let child = Command::new(&binary)
            .env(HOME_ENV, &ctx.config.home)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .with_context(|| format!("Failed to start {}", binary.display()))?;

        formatter.success(&format!("docsync daemon started (pid {})", child.id()));
        formatter.print_json(&serde_json::json!({
            "action": "start",
            "success": true,
            "pid": child.id(),
        }));
        Ok(())
    }
}

/// `docsyncd` next to this executable, or from `PATH`
fn daemon_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DAEMON_BINARY)))
        .filter(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(DAEMON_BINARY))
}

// ============================================================================
// stop
// ============================================================================

#[derive(Debug, Args)]
pub struct StopCommand {}

impl StopCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let pid_path = ctx.config.pid_path();

        let Some(pid) = running_daemon(&pid_path) else {
            formatter.info("docsync daemon is not running");
            formatter.print_json(&serde_json::json!({
                "action": "stop",
                "success": true,
                "running": false,
            }));
            return Ok(());
        };

        info!(pid, "Stopping docsync daemon");
        // SAFETY: kill has no memory-safety preconditions
        if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).with_context(|| format!("Failed to signal pid {pid}"));
        }

        formatter.success(&format!("Sent SIGTERM to docsync daemon (pid {pid})"));
        formatter.print_json(&serde_json::json!({
            "action": "stop",
            "success": true,
            "pid": pid,
        }));
        Ok(())
    }
}

/// Pid of a live daemon, if the pid file names one
fn running_daemon(pid_path: &Path) -> Option<i32> {
    let pid: i32 = std::fs::read_to_string(pid_path).ok()?.trim().parse().ok()?;
    // SAFETY: signal 0 only checks that the process exists
    let alive = pid > 0 && unsafe { libc::kill(pid, 0) } == 0;
    if !alive {
        debug!(pid, path = %pid_path.display(), "Stale pid file");
    }
    alive.then_some(pid)
}
