//! Main CLI parser and global options.

use clap::Parser;

use crate::commands::Commands;

/// Real-time fan-out for signage displays and controllers.
#[derive(Debug, Parser)]
#[command(name = "signage")]
#[command(about = "Push playlist and playback events to connected displays")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
