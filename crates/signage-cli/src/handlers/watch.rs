//! Watch command handler.
//!
//! Attaches a subscriber to a running server and prints each frame as
//! `<event> <data>` on stdout. Useful for checking a deployment by hand.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use signage_client::{ConnectionState, MessageEvent, SubscriberClient, SubscriberOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::WatchArgs;

/// Stream events until `shutdown` is cancelled, or until the first error
/// when reconnecting is disabled.
pub async fn execute(args: WatchArgs, shutdown: CancellationToken) -> Result<()> {
    let options = SubscriberOptions::new(&args.url)
        .with_reconnect(!args.no_reconnect)
        .with_reconnect_interval(Duration::from_secs(args.reconnect_secs.max(1)));
    let client = SubscriberClient::new(options).context("Failed to build subscriber")?;

    let filter: Arc<HashSet<String>> = Arc::new(args.events.into_iter().collect());
    client.on_message(move |message| {
        if filter.is_empty() || filter.contains(&message.event) {
            println!("{}", format_message(message));
        }
        Ok(())
    });
    client.on_open(|| info!("Watching event stream"));
    client.on_error(|err| warn!(error = %err, "Event stream interrupted"));

    let mut state = client.watch_state();
    client.connect();

    if args.no_reconnect {
        // Without reconnect the first transport failure ends the watch
        tokio::select! {
            () = shutdown.cancelled() => {}
            changed = state.wait_for(|s| *s == ConnectionState::Disconnected) => {
                changed.context("Subscriber closed")?;
            }
        }
    } else {
        shutdown.cancelled().await;
    }

    client.disconnect();
    Ok(())
}

fn format_message(message: &MessageEvent) -> String {
    match &message.last_event_id {
        Some(id) => format!("{} [{id}] {}", message.event, message.data),
        None => format!("{} {}", message.event, message.data),
    }
}
