//! Subcommand definitions.

use std::net::IpAddr;
use std::time::Duration;

use clap::{Args, Subcommand};
use signage_axum::{CorsConfig, ServerConfig};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the event stream server
    Serve(ServeArgs),

    /// Subscribe to a running server and print received events
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "SIGNAGE_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to serve on
    #[arg(short, long, env = "SIGNAGE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds between keep-alive comments on each stream
    #[arg(long, env = "SIGNAGE_KEEP_ALIVE_SECS", default_value_t = 30)]
    pub keep_alive_secs: u64,

    /// Frames buffered per stream before it counts as stalled
    #[arg(long, env = "SIGNAGE_CHANNEL_CAPACITY", default_value_t = 256)]
    pub channel_capacity: usize,

    /// Known display ids (comma separated)
    #[arg(long, env = "SIGNAGE_DISPLAYS", value_delimiter = ',')]
    pub displays: Vec<String>,

    /// Playlist assignments as `playlist=display` (repeatable or comma separated)
    #[arg(
        long = "assign",
        env = "SIGNAGE_ASSIGNMENTS",
        value_delimiter = ',',
        value_parser = parse_assignment
    )]
    pub assignments: Vec<(String, String)>,

    /// Allowed CORS origins; all origins when empty
    #[arg(long = "allow-origin", env = "SIGNAGE_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,
}

impl ServeArgs {
    pub fn into_config(self) -> ServerConfig {
        let cors = if self.allowed_origins.is_empty() {
            CorsConfig::AllowAll
        } else {
            CorsConfig::AllowOrigins(self.allowed_origins)
        };

        ServerConfig {
            host: self.host,
            port: self.port,
            keep_alive_interval: Duration::from_secs(self.keep_alive_secs.max(1)),
            channel_capacity: self.channel_capacity.max(1),
            displays: self.displays,
            assignments: self.assignments,
            cors,
        }
    }
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stream URL, e.g. http://localhost:3000/api/sse?target=lobby
    #[arg(long, env = "SIGNAGE_STREAM_URL")]
    pub url: String,

    /// Only print these event names (repeatable); all events when omitted
    #[arg(long = "event", short = 'e')]
    pub events: Vec<String>,

    /// Seconds to wait before reconnecting
    #[arg(long, default_value_t = 5)]
    pub reconnect_secs: u64,

    /// Exit on the first transport error instead of reconnecting
    #[arg(long)]
    pub no_reconnect: bool,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((playlist, display)) if !playlist.is_empty() && !display.is_empty() => {
            Ok((playlist.trim().to_string(), display.trim().to_string()))
        }
        _ => Err(format!("expected playlist=display, got '{raw}'")),
    }
}
