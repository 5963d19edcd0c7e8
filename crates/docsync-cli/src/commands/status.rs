//! Status command - print the state of each child of a folder
//!
//! Output is one `<state>\t<name>` line per child, sorted by name. Children
//! still pending creation on the remote side are included.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::context::AppContext;
use crate::output::get_formatter;

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Folder to inspect; defaults to the current directory
    pub folder: Option<PathBuf>,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let folder = match &self.folder {
            Some(folder) => folder.clone(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };

        if !ctx.config.database_path().exists() {
            formatter.error("No database found. Run 'docsync bind-server' first.");
            return Ok(());
        }

        let controller = ctx.controller().await?;
        let states = controller.children_states(&folder).await;
        controller.dispose().await;
        let states = states
            .with_context(|| format!("Failed to read states of {}", folder.display()))?;

        formatter.print_states(&states);
        Ok(())
    }
}
