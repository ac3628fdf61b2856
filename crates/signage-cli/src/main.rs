//! CLI entry point - the composition root.
//!
//! Loads `.env`, sets up logging, installs the Ctrl-C handler and hands the
//! parsed command to its handler.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use signage_cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            signal.cancel();
        }
    });

    match cli.command {
        Commands::Serve(args) => handlers::serve::execute(args, shutdown).await,
        Commands::Watch(args) => handlers::watch::execute(args, shutdown).await,
    }
}
