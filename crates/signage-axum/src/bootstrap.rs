//! Axum server bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the web adapter. The registry is constructed here once and injected
//! into the stream endpoint and the notifier.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use signage_core::{BroadcastRegistry, DisplayDirectory, InMemoryDisplayDirectory, Notifier};
use tokio_util::sync::CancellationToken;

use crate::sse::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_KEEP_ALIVE, SseHub, StreamSettings};

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: IpAddr,
    /// Port for the HTTP server.
    pub port: u16,
    /// Interval between keep-alive comments on each stream.
    pub keep_alive_interval: Duration,
    /// Frames buffered per stream before the channel counts as stalled.
    pub channel_capacity: usize,
    /// Display ids known to the in-memory directory.
    pub displays: Vec<String>,
    /// `(playlist_id, display_id)` assignments for the in-memory directory.
    pub assignments: Vec<(String, String)>,
    /// CORS configuration.
    pub cors: CorsConfig,
}

impl ServerConfig {
    /// Create config with default values.
    pub fn with_defaults() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            keep_alive_interval: DEFAULT_KEEP_ALIVE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            displays: Vec::new(),
            assignments: Vec::new(),
            cors: CorsConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    #[must_use]
    pub fn with_displays<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.displays.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Assign a playlist to a display in the seeded directory.
    #[must_use]
    pub fn with_assignment(
        mut self,
        playlist_id: impl Into<String>,
        display_id: impl Into<String>,
    ) -> Self {
        self.assignments
            .push((playlist_id.into(), display_id.into()));
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }

    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub const fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            keep_alive_interval: self.keep_alive_interval,
            channel_capacity: self.channel_capacity,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    /// The one registry of open stream channels.
    pub registry: Arc<BroadcastRegistry>,
    /// Opens channels for the stream endpoint.
    pub hub: SseHub,
    /// Pushes notifications after application writes.
    pub notifier: Notifier,
    /// Display lookups.
    pub directory: Arc<dyn DisplayDirectory>,
}

/// Wire up the registry, directory, hub and notifier.
///
/// Streams end when `shutdown` is cancelled.
pub fn bootstrap(config: &ServerConfig, shutdown: &CancellationToken) -> AxumContext {
    let directory = InMemoryDisplayDirectory::with_displays(config.displays.iter().cloned());
    for (playlist_id, display_id) in &config.assignments {
        directory.assign_playlist(display_id.clone(), playlist_id.clone());
    }

    bootstrap_with_directory(config, shutdown, Arc::new(directory))
}

/// Same as [`bootstrap`] with an externally provided directory.
pub fn bootstrap_with_directory(
    config: &ServerConfig,
    shutdown: &CancellationToken,
    directory: Arc<dyn DisplayDirectory>,
) -> AxumContext {
    tracing::info!(
        target: "signage.bootstrap",
        displays = config.displays.len(),
        assignments = config.assignments.len(),
        keep_alive_secs = config.keep_alive_interval.as_secs(),
        channel_capacity = config.channel_capacity,
        "Axum bootstrap"
    );

    let registry = Arc::new(BroadcastRegistry::new());
    let hub = SseHub::new(
        Arc::clone(&registry),
        config.stream_settings(),
        shutdown.clone(),
    );
    let notifier = Notifier::new(Arc::clone(&registry), Arc::clone(&directory));

    AxumContext {
        registry,
        hub,
        notifier,
        directory,
    }
}

/// Start the web server and run until `shutdown` is cancelled.
pub async fn start_server(config: ServerConfig, shutdown: CancellationToken) -> Result<()> {
    use tokio::net::TcpListener;
    use tracing::info;

    let ctx = bootstrap(&config, &shutdown);
    let registry = Arc::clone(&ctx.registry);
    let app = crate::routes::create_router(ctx, &config.cors);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    info!("signage server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    registry.clear();
    info!("signage server stopped");
    Ok(())
}
