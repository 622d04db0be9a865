//! # waymark-cli
//!
//! Command-line interface for Waymark — goal tracking for AI coding
//! agents over an append-only event log.
//!
//! - `waymark goal add/start/update/block/…` — drive a goal's lifecycle
//! - `waymark goal finish` — QA-gated completion with bounded review turns
//! - `waymark goal list/status` — inspect the read model and claims
//! - `waymark review record` — spend one review turn explicitly
//! - `waymark rebuild` — replay the full event log into fresh views
//!
//! Each invocation is one short-lived process; concurrent workers on the
//! same project coordinate through the advisory claim table.

mod commands;
mod context;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Waymark CLI — track agent goals through their lifecycle.
#[derive(Parser)]
#[command(name = "waymark", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage goals.
    Goal {
        #[command(subcommand)]
        command: commands::goal::GoalCommands,
    },
    /// Record QA review turns.
    Review {
        #[command(subcommand)]
        command: commands::review::ReviewCommands,
    },
    /// Rebuild goal views by replaying the full event log.
    Rebuild,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("waymark_domain=info".parse()?)
                .add_directive("waymark_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let ctx = context::AppContext::build(&project_root)?;

    match &cli.command {
        Commands::Goal { command } => commands::goal::execute(command, &ctx),
        Commands::Review { command } => commands::review::execute(command, &ctx),
        Commands::Rebuild => commands::rebuild::execute(&ctx),
    }
}
