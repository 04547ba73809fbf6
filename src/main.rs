//! Pool sync indexer command-line entry point.

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use pool_sync_indexer::{IndexerError, config::Configuration, service};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Ingests a pool's `Sync` events into `PostgreSQL` and serves them over HTTP.
#[derive(Parser)]
#[command(name = "pool-sync-indexer")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingestion worker
    Worker(ConfigArgs),

    /// Serve the read API
    Api(ConfigArgs),

    /// Run the worker and the read API in one process
    Run(ConfigArgs),
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// Path to the JSON configuration file
    #[arg(env = "POOL_SYNC_CONFIG", default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "pool-sync-indexer stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), IndexerError> {
    let (Command::Worker(args) | Command::Api(args) | Command::Run(args)) = &command;
    let config = Configuration::from_file(&args.config)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown requested");
                    cancel.cancel();
                }
                Err(err) => tracing::warn!(error = %err, "Cannot listen for Ctrl-C"),
            }
        }
    });

    match command {
        Command::Worker(_) => service::run_worker(&config, cancel).await,
        Command::Api(_) => service::run_api(&config, cancel).await,
        Command::Run(_) => service::run_all(&config, cancel).await,
    }
}
