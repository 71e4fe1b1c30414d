//! Grocery CLI - offline-first grocery lists from the terminal
//!
//! Every change is written to the local database first and mirrored to the
//! backend before the process exits.

mod cli;
mod commands;
mod config;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{open_repository, Repo};
use crate::commands::config::run_config;
use crate::commands::items::{run_clear_completed, run_item_command, run_items};
use crate::commands::lists::{run_list_command, run_lists};
use crate::commands::sync::{run_clear_all, run_status, run_sync};
use crate::config::{env_lookup, Paths};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("grocery_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = Paths::resolve(cli.config_path, cli.db_path, env_lookup)?;

    match cli.command {
        Commands::Config { command } => run_config(&paths, command),
        command => {
            let repo = open_repository(&paths)?;
            let result = run_command(&repo, &paths, command).await;
            // Give queued backend writes a chance to land before exiting
            repo.flush_mirrors().await;
            result
        }
    }
}

async fn run_command(repo: &Repo, paths: &Paths, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Lists { json } => run_lists(repo, json).await,
        Commands::List { command } => run_list_command(repo, command).await,
        Commands::Items { list, json, sort } => run_items(repo, &list, json, sort).await,
        Commands::Item { command } => run_item_command(repo, command).await,
        Commands::ClearCompleted { list } => run_clear_completed(repo, &list).await,
        Commands::Sync { force } => run_sync(repo, force).await,
        Commands::Status { json } => run_status(repo, json).await,
        Commands::ClearAll { yes } => run_clear_all(repo, yes).await,
        Commands::Config { command } => run_config(paths, command),
    }
}
