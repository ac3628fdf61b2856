//! Event stream channels for connected browser tabs.
//!
//! Every `GET /api/sse` turns into one registry channel: a bounded mpsc
//! queue whose sender is registered as the channel sink and whose receiver
//! becomes the SSE body. Keep-alive comments come from axum's
//! [`KeepAlive`], so idle connections survive proxies and a dead peer is
//! noticed on the next keep-alive write.
//!
//! # Teardown
//!
//! A [`ChannelLease`] is held by the body stream. Whichever of these comes
//! first releases it:
//!
//! - the body is dropped (client went away or a write failed)
//! - the registry prunes the channel, which closes the queue
//! - the server shutdown token is cancelled
//!
//! Releasing unregisters the channel exactly once.

use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::Stream;
use signage_core::frame::KEEP_ALIVE_COMMENT;
use signage_core::{BroadcastRegistry, ChannelId, ConnectedPayload, Frame, StreamEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Default keep-alive period.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Default number of frames buffered per channel before it counts as stalled.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// Tunables shared by every stream channel.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub keep_alive_interval: Duration,
    pub channel_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            keep_alive_interval: DEFAULT_KEEP_ALIVE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Why a channel was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    ClientDisconnected,
    /// The registry dropped the channel after a failed write.
    Pruned,
    Shutdown,
}

impl fmt::Display for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClientDisconnected => "client disconnected",
            Self::Pruned => "channel pruned",
            Self::Shutdown => "server shutdown",
        })
    }
}

/// Ownership of one registered channel.
#[derive(Debug)]
pub struct ChannelLease {
    id: ChannelId,
    generation: u64,
    registry: Arc<BroadcastRegistry>,
    cancel: CancellationToken,
    released: AtomicBool,
}

impl ChannelLease {
    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Unregister the channel and end its stream. Only the first call has
    /// any effect, and a newer registration under the same id is kept.
    pub fn release(&self, reason: Teardown) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        self.registry.unregister_if(&self.id, self.generation);
        info!(channel_id = %self.id, %reason, "Stream channel closed");
    }
}

/// Releases the lease when the response body is dropped.
struct LeaseGuard(Arc<ChannelLease>);

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let reason = if self.0.cancel.is_cancelled() {
            Teardown::Shutdown
        } else {
            Teardown::ClientDisconnected
        };
        self.0.release(reason);
    }
}

/// A freshly opened channel, ready to be returned as a response.
pub struct OpenChannel {
    pub lease: Arc<ChannelLease>,
    keep_alive_interval: Duration,
    stream: EventStream,
}

impl IntoResponse for OpenChannel {
    fn into_response(self) -> Response {
        let sse = Sse::new(self.stream).keep_alive(
            KeepAlive::new()
                .interval(self.keep_alive_interval)
                .text(KEEP_ALIVE_COMMENT),
        );

        (
            [
                (
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache, no-transform"),
                ),
                (header::CONNECTION, HeaderValue::from_static("keep-alive")),
                (
                    HeaderName::from_static("x-accel-buffering"),
                    HeaderValue::from_static("no"),
                ),
            ],
            sse,
        )
            .into_response()
    }
}

/// Opens stream channels against one registry.
#[derive(Debug, Clone)]
pub struct SseHub {
    registry: Arc<BroadcastRegistry>,
    settings: StreamSettings,
    shutdown: CancellationToken,
}

impl SseHub {
    pub fn new(
        registry: Arc<BroadcastRegistry>,
        settings: StreamSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            settings,
            shutdown,
        }
    }

    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    /// Register a new channel and queue its `connected` acknowledgement.
    pub fn open(&self, target: Option<String>) -> OpenChannel {
        let id = ChannelId::new(Uuid::new_v4().to_string());
        let target = target.filter(|t| !t.is_empty());
        let (tx, rx) = mpsc::channel::<Frame>(self.settings.channel_capacity.max(1));

        let generation = self
            .registry
            .register(id.clone(), Arc::new(tx), target.clone());

        let lease = Arc::new(ChannelLease {
            id: id.clone(),
            generation,
            registry: Arc::clone(&self.registry),
            cancel: self.shutdown.child_token(),
            released: AtomicBool::new(false),
        });

        let connected = StreamEvent::Connected(ConnectedPayload {
            client_id: id.to_string(),
            display_id: target,
        });
        self.registry.emit_to_one(&id, &connected);

        OpenChannel {
            stream: Box::pin(event_stream(rx, LeaseGuard(Arc::clone(&lease)))),
            keep_alive_interval: self.settings.keep_alive_interval,
            lease,
        }
    }
}

/// Body stream: frames from the channel queue until the queue closes or the
/// lease is cancelled. Dropping it releases the lease.
fn event_stream(
    mut rx: mpsc::Receiver<Frame>,
    guard: LeaseGuard,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    async_stream::stream! {
        let guard = guard;
        let cancel = guard.0.cancel.clone();

        loop {
            let next = tokio::select! {
                frame = rx.recv() => frame,
                () = cancel.cancelled() => None,
            };

            match next {
                Some(frame) => {
                    yield Ok(Event::default().event(frame.event_name()).data(frame.data()));
                }
                None => break,
            }
        }

        let reason = if cancel.is_cancelled() {
            Teardown::Shutdown
        } else {
            Teardown::Pruned
        };
        guard.0.release(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use serde_json::json;

    fn hub(keep_alive_secs: u64, capacity: usize) -> (SseHub, CancellationToken) {
        let shutdown = CancellationToken::new();
        let settings = StreamSettings {
            keep_alive_interval: Duration::from_secs(keep_alive_secs),
            channel_capacity: capacity,
        };
        let hub = SseHub::new(
            Arc::new(BroadcastRegistry::new()),
            settings,
            shutdown.clone(),
        );
        (hub, shutdown)
    }

    /// Open a channel and return its lease plus the response body.
    fn open(hub: &SseHub, target: Option<&str>) -> (Arc<ChannelLease>, Body) {
        let channel = hub.open(target.map(str::to_string));
        let lease = Arc::clone(&channel.lease);
        (lease, channel.into_response().into_body())
    }

    async fn next_text(body: &mut Body) -> Option<String> {
        let frame = body.frame().await?.unwrap();
        let data = frame.into_data().unwrap();
        Some(String::from_utf8(data.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_open_registers_and_acknowledges() {
        let (hub, _shutdown) = hub(30, 8);
        let (lease, mut body) = open(&hub, Some("disp-1"));
        let id = lease.id().clone();

        assert_eq!(hub.registry().count(), 1);
        assert_eq!(hub.registry().target_of(&id), Some("disp-1".to_string()));

        assert_eq!(
            next_text(&mut body).await.unwrap(),
            format!("event: connected\ndata: {{\"clientId\":\"{id}\",\"displayId\":\"disp-1\"}}\n\n")
        );
    }

    #[tokio::test]
    async fn test_response_headers() {
        let (hub, _shutdown) = hub(30, 8);
        let response = hub.open(None).into_response();

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-transform");
        assert_eq!(headers["x-accel-buffering"], "no");
    }

    #[tokio::test]
    async fn test_dropping_body_unregisters_once() {
        let (hub, _shutdown) = hub(30, 8);
        let (lease, body) = open(&hub, None);

        drop(body);

        assert!(lease.is_released());
        assert_eq!(hub.registry().count(), 0);

        // Second release is a no-op
        lease.release(Teardown::Pruned);
        assert_eq!(hub.registry().count(), 0);
    }

    #[tokio::test]
    async fn test_release_keeps_newer_registration() {
        let (hub, _shutdown) = hub(30, 8);
        let (lease, _body) = open(&hub, None);

        // Same id registered again by someone else
        let (tx, _rx) = mpsc::channel::<Frame>(1);
        hub.registry()
            .register(lease.id().clone(), Arc::new(tx), Some("disp-9".to_string()));

        lease.release(Teardown::ClientDisconnected);

        assert_eq!(hub.registry().target_of(lease.id()), Some("disp-9".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_comment_after_interval() {
        let (hub, _shutdown) = hub(30, 8);
        let (_lease, mut body) = open(&hub, None);

        let _connected = next_text(&mut body).await.unwrap();
        let ping = next_text(&mut body).await.unwrap();

        assert_eq!(ping, ": keep-alive\n\n");
        assert_eq!(hub.registry().count(), 1);
    }

    #[tokio::test]
    async fn test_full_buffer_prunes_and_ends_stream() {
        // Capacity 1 is filled by the connected frame
        let (hub, _shutdown) = hub(30, 1);
        let (lease, mut body) = open(&hub, Some("disp-1"));

        let delivery = hub
            .registry()
            .send_to_target("disp-1", "control", &json!({"command": "play"}));
        assert_eq!(delivery.pruned, 1);
        assert_eq!(hub.registry().count(), 0);

        // The queued acknowledgement still drains, then the stream ends
        assert!(next_text(&mut body).await.unwrap().starts_with("event: connected\n"));
        assert!(next_text(&mut body).await.is_none());
        assert!(lease.is_released());
    }

    #[tokio::test]
    async fn test_shutdown_ends_stream() {
        let (hub, shutdown) = hub(30, 8);
        let (lease, mut body) = open(&hub, None);
        let _connected = next_text(&mut body).await.unwrap();

        shutdown.cancel();

        assert!(next_text(&mut body).await.is_none());
        assert!(lease.is_released());
        assert_eq!(hub.registry().count(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_channel_ends_stream() {
        let (hub, _shutdown) = hub(30, 8);
        let (lease, mut body) = open(&hub, None);
        let _connected = next_text(&mut body).await.unwrap();

        hub.registry().unregister(lease.id());

        assert!(next_text(&mut body).await.is_none());
        assert!(lease.is_released());
    }
}
