//! Binding commands
//!
//! - `bind-server <local_folder> <username> <url>` authenticates and records
//!   the server binding, then binds each `--remote-root`
//! - `unbind-server <local_folder>`
//! - `bind-root <local_folder> <remote_root>`
//! - `unbind-root <local_root>`
//!
//! Unbinding only forgets state; files on disk are never touched.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use docsync_core::domain::RemoteRef;
use tracing::info;

use crate::context::AppContext;
use crate::output::get_formatter;

// ============================================================================
// bind-server
// ============================================================================

#[derive(Debug, Args)]
pub struct BindServerCommand {
    /// Local folder that will hold the synchronized roots
    pub local_folder: PathBuf,
    pub username: String,
    /// Server URL, e.g. http://localhost:8080/nuxeo
    pub url: String,
    /// Password; read from stdin when omitted
    #[arg(long)]
    pub password: Option<String>,
    /// Remote folder id to synchronize (repeatable)
    #[arg(long = "remote-root")]
    pub remote_roots: Vec<String>,
    /// Repository of the remote roots
    #[arg(long)]
    pub remote_repo: Option<String>,
}

impl BindServerCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let roots = parse_roots(&self.remote_roots)?;

        let password = match &self.password {
            Some(password) => password.clone(),
            None => {
                eprint!("Password for {}: ", self.username);
                std::io::stderr().flush().ok();
                read_password(std::io::stdin().lock())?
            }
        };

        let controller = ctx.controller().await?;
        let result = controller
            .bind_server(
                &self.local_folder,
                &self.url,
                &self.username,
                &password,
                &roots,
                self.remote_repo.as_deref(),
            )
            .await;
        controller.dispose().await;
        let binding = result.context("Failed to bind server")?;

        info!(folder = %binding.local_folder.display(), roots = roots.len(), "Server bound");
        formatter.success(&format!(
            "Bound {} to {} as {}",
            binding.local_folder.display(),
            binding.server_url,
            binding.username
        ));
        formatter.print_json(&serde_json::json!({
            "action": "bind-server",
            "local_folder": binding.local_folder,
            "server_url": binding.server_url,
            "username": binding.username,
            "roots": self.remote_roots,
        }));
        Ok(())
    }
}

/// Reads one line, without its line ending
fn read_password(mut reader: impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(&['\r', '\n'][..]);
    if password.is_empty() {
        anyhow::bail!("A password is required");
    }
    Ok(password.to_string())
}

fn parse_roots(ids: &[String]) -> Result<Vec<RemoteRef>> {
    ids.iter()
        .map(|id| RemoteRef::new(id.clone()).with_context(|| format!("Invalid remote root '{id}'")))
        .collect()
}

// ============================================================================
// unbind-server
// ============================================================================

#[derive(Debug, Args)]
pub struct UnbindServerCommand {
    pub local_folder: PathBuf,
}

impl UnbindServerCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let controller = ctx.controller().await?;
        let result = controller.unbind_server(&self.local_folder).await;
        controller.dispose().await;
        result.context("Failed to unbind server")?;

        formatter.success(&format!("Unbound {}", self.local_folder.display()));
        formatter.print_json(&serde_json::json!({
            "action": "unbind-server",
            "local_folder": self.local_folder,
        }));
        Ok(())
    }
}

// ============================================================================
// bind-root
// ============================================================================

#[derive(Debug, Args)]
pub struct BindRootCommand {
    /// An already bound local folder
    pub local_folder: PathBuf,
    /// Id of the remote folder to synchronize
    pub remote_root: String,
    #[arg(long)]
    pub remote_repo: Option<String>,
}

impl BindRootCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let remote_root = RemoteRef::new(self.remote_root.clone())
            .with_context(|| format!("Invalid remote root '{}'", self.remote_root))?;

        let controller = ctx.controller().await?;
        let result = controller
            .bind_root(&self.local_folder, &remote_root, self.remote_repo.as_deref())
            .await;
        controller.dispose().await;
        let binding = result.context("Failed to bind root")?;

        formatter.success(&format!(
            "Synchronizing {} into {}",
            binding.remote_root,
            binding.local_root.display()
        ));
        formatter.print_json(&serde_json::json!({
            "action": "bind-root",
            "local_root": binding.local_root,
            "remote_root": binding.remote_root.as_str(),
            "repository": binding.remote_repository,
        }));
        Ok(())
    }
}

// ============================================================================
// unbind-root
// ============================================================================

#[derive(Debug, Args)]
pub struct UnbindRootCommand {
    pub local_root: PathBuf,
}

impl UnbindRootCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let controller = ctx.controller().await?;
        let result = controller.unbind_root(&self.local_root).await;
        controller.dispose().await;
        result.context("Failed to unbind root")?;

        formatter.success(&format!("Unbound {}", self.local_root.display()));
        formatter.print_json(&serde_json::json!({
            "action": "unbind-root",
            "local_root": self.local_root,
        }));
        Ok(())
    }
}
