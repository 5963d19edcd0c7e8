//! docsync CLI - Command-line interface for docsync
//!
//! Provides commands for:
//! - Binding local folders to server accounts and remote roots
//! - Running the synchronization loop in the foreground
//! - Starting and stopping the background daemon
//! - Showing the state of each child of a synchronized folder

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod context;
mod logging;
mod output;

use commands::{
    bind::{BindRootCommand, BindServerCommand, UnbindRootCommand, UnbindServerCommand},
    console::ConsoleCommand,
    daemon::{StartCommand, StopCommand},
    status::StatusCommand,
};
use context::{AppContext, GlobalArgs};

#[derive(Debug, Parser)]
#[command(name = "docsync", version, about = "Bidirectional document folder synchronization")]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize in the foreground until Ctrl+C
    Console(ConsoleCommand),
    /// Start the background daemon
    Start(StartCommand),
    /// Stop the background daemon
    Stop(StopCommand),
    /// Bind a local folder to a server account
    BindServer(BindServerCommand),
    /// Remove a server binding; local files are kept
    UnbindServer(UnbindServerCommand),
    /// Synchronize a remote folder below a bound local folder
    BindRoot(BindRootCommand),
    /// Stop synchronizing one root; local files are kept
    UnbindRoot(UnbindRootCommand),
    /// Show the state of each child of a folder
    Status(StatusCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cli.global.config()?;
    logging::init(&config)?;

    let ctx = AppContext::new(config, cli.global.format());

    match cli.command {
        Commands::Console(cmd) => cmd.execute(&ctx).await,
        Commands::Start(cmd) => cmd.execute(&ctx).await,
        Commands::Stop(cmd) => cmd.execute(&ctx).await,
        Commands::BindServer(cmd) => cmd.execute(&ctx).await,
        Commands::UnbindServer(cmd) => cmd.execute(&ctx).await,
        Commands::BindRoot(cmd) => cmd.execute(&ctx).await,
        Commands::UnbindRoot(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
    }
}
