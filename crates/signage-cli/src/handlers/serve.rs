//! Serve command handler.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::commands::ServeArgs;

/// Run the event stream server until `shutdown` is cancelled.
pub async fn execute(args: ServeArgs, shutdown: CancellationToken) -> Result<()> {
    let config = args.into_config();
    info!(
        displays = config.displays.len(),
        assignments = config.assignments.len(),
        keep_alive_secs = config.keep_alive_interval.as_secs(),
        "Starting signage server"
    );

    signage_axum::start_server(config, shutdown).await
}
