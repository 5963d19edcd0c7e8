//! Console command - run the synchronization loop in the foreground

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::output::get_formatter;

#[derive(Debug, Args)]
pub struct ConsoleCommand {}

impl ConsoleCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let controller = ctx.controller().await?;
        let synchronizer = controller.synchronizer();

        let stopper = synchronizer.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received SIGINT (Ctrl+C)");
                    stopper.stop();
                }
                Err(e) => warn!(error = %e, "Failed to install Ctrl+C handler"),
            }
        });

        formatter.info(&format!(
            "Synchronizing every {}s, press Ctrl+C to stop",
            ctx.config.sync.delay_secs
        ));
        let result = synchronizer
            .run_loop(ctx.config.sync.delay(), ctx.config.sync.max_sync_step)
            .await;
        controller.dispose().await;
        result.context("Synchronization stopped on error")?;

        formatter.success("Synchronization stopped");
        Ok(())
    }
}
