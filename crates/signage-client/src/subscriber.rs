//! Reconnecting event stream subscriber.
//!
//! A [`SubscriberClient`] keeps one transport open to the stream endpoint,
//! parses frames and hands each one to the `on_message` callback and to the
//! listeners registered for its event name.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected --connect()--> Connecting --open--> Connected
//!                                  |                   |
//!                                  +------error--------+
//!                                  v
//!                            Reconnecting --interval--> Connecting
//! ```
//!
//! `disconnect()` moves to `Disconnected` from any state and stays there
//! until `connect()` or `set_url()` is called again.
//!
//! # Concurrency
//!
//! Each connection attempt runs in its own task and carries an epoch. Any
//! event from a task whose epoch is no longer current is discarded, so a
//! superseded transport can neither dispatch frames nor schedule a retry.
//! At most one reconnect timer is pending at a time.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connector::{Connector, HttpConnector};
use crate::error::ClientError;
use crate::message::MessageEvent;
use crate::parser::SseParser;

/// Delay between a transport error and the next connection attempt.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Subscriber configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberOptions {
    /// Full stream URL, including any `?target=` query.
    pub url: String,
    /// Retry after transport errors.
    pub reconnect: bool,
    /// Fixed delay before each retry.
    pub reconnect_interval: Duration,
}

impl SubscriberOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    #[must_use]
    pub const fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting for the reconnect timer.
    Reconnecting,
}

/// Handle returned by [`SubscriberClient::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&MessageEvent) -> anyhow::Result<()> + Send + Sync>;
type OpenCallback = Arc<dyn Fn() + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&ClientError) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_open: Option<OpenCallback>,
    on_error: Option<ErrorCallback>,
    on_message: Option<Handler>,
}

struct Session {
    url: String,
    /// Cleared by `disconnect()`; no attempt starts while false.
    active: bool,
    epoch: u64,
    transport: Option<JoinHandle<()>>,
    pending_reconnect: Option<JoinHandle<()>>,
    /// Bumped whenever a reconnect timer is scheduled or cancelled. A timer
    /// only starts an attempt while its generation is still current.
    reconnect_generation: u64,
}

impl Session {
    /// Abort the pending reconnect timer. A timer that already woke up and
    /// is waiting on the session lock sees a stale generation and stops.
    fn cancel_reconnect(&mut self) {
        self.reconnect_generation += 1;
        if let Some(timer) = self.pending_reconnect.take() {
            timer.abort();
        }
    }
}

struct Inner {
    connector: Arc<dyn Connector>,
    reconnect: bool,
    reconnect_interval: Duration,
    session: Mutex<Session>,
    state: watch::Sender<ConnectionState>,
    callbacks: RwLock<Callbacks>,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Handler)>>>,
    next_listener: AtomicU64,
}

/// Event stream subscriber with automatic reconnection.
///
/// Dropping the client disconnects it.
pub struct SubscriberClient {
    inner: Arc<Inner>,
}

impl SubscriberClient {
    /// Create a client using the HTTP connector. Does not connect yet.
    pub fn new(options: SubscriberOptions) -> Result<Self, ClientError> {
        Ok(Self::with_connector(options, Arc::new(HttpConnector::new()?)))
    }

    /// Create a client over a custom transport.
    pub fn with_connector(options: SubscriberOptions, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                connector,
                reconnect: options.reconnect,
                reconnect_interval: options.reconnect_interval,
                session: Mutex::new(Session {
                    url: options.url,
                    active: false,
                    epoch: 0,
                    transport: None,
                    pending_reconnect: None,
                    reconnect_generation: 0,
                }),
                state,
                callbacks: RwLock::new(Callbacks::default()),
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// Open the stream, replacing any current transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut session = self.inner.session();
        session.active = true;
        session.cancel_reconnect();
        self.inner.start_attempt(&mut session);
    }

    /// Close the stream and cancel any pending reconnect. Nothing reconnects
    /// afterwards until `connect()` or `set_url()` is called.
    pub fn disconnect(&self) {
        let was_active = {
            let mut session = self.inner.session();
            let was_active = session.active;
            session.active = false;
            session.epoch += 1;
            session.cancel_reconnect();
            if let Some(transport) = session.transport.take() {
                transport.abort();
            }
            self.inner.set_state(ConnectionState::Disconnected);
            was_active
        };
        if was_active {
            info!("Event stream subscriber disconnected");
        }
    }

    /// Point the client at a new URL and reconnect. Listeners are kept.
    pub fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        let mut session = self.inner.session();
        info!(from = %session.url, to = %url, "Event stream URL changed");
        session.url = url;
        session.active = true;
        session.cancel_reconnect();
        self.inner.start_attempt(&mut session);
    }

    pub fn url(&self) -> String {
        self.inner.session().url.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Called each time a transport opens.
    pub fn on_open<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.callbacks_mut().on_open = Some(Arc::new(callback));
    }

    /// Called for every transport error, before any reconnect is scheduled.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        self.inner.callbacks_mut().on_error = Some(Arc::new(callback));
    }

    /// Called for every dispatched frame, whatever its event name.
    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(&MessageEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.callbacks_mut().on_message = Some(Arc::new(callback));
    }

    /// Register a handler for one event name. Handlers run in registration
    /// order; an error or panic in one does not stop the others.
    pub fn add_event_listener<F>(&self, event: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&MessageEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners()
            .entry(event.into())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Register a handler that receives the frame's data parsed as `T`.
    /// Frames that fail to parse are reported like a failing handler.
    pub fn add_typed_listener<T, F>(&self, event: impl Into<String>, handler: F) -> ListenerId
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_event_listener(event, move |message: &MessageEvent| {
            let payload = message.json::<T>()?;
            handler(payload)
        })
    }

    /// Returns `true` if the handler was registered under `event`.
    pub fn remove_event_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners();
        let Some(handlers) = listeners.get_mut(event) else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            listeners.remove(event);
        }
        removed
    }
}

impl Drop for SubscriberClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for SubscriberClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberClient")
            .field("url", &self.url())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<String, Vec<(ListenerId, Handler)>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn callbacks(&self) -> RwLockReadGuard<'_, Callbacks> {
        self.callbacks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn callbacks_mut(&self) -> RwLockWriteGuard<'_, Callbacks> {
        self.callbacks.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Replace the current transport with a fresh attempt. Caller holds the
    /// session lock so `disconnect()` cannot interleave.
    fn start_attempt(self: &Arc<Self>, session: &mut Session) {
        session.epoch += 1;
        if let Some(old) = session.transport.take() {
            old.abort();
        }

        let epoch = session.epoch;
        let url = session.url.clone();
        self.set_state(ConnectionState::Connecting);
        debug!(%url, epoch, "Opening event stream");

        let inner = Arc::clone(self);
        session.transport = Some(tokio::spawn(async move {
            inner.run_transport(epoch, url).await;
        }));
    }

    async fn run_transport(self: Arc<Self>, epoch: u64, url: String) {
        let mut stream = match self.connector.open(&url).await {
            Ok(stream) => stream,
            Err(err) => {
                self.fail(epoch, err);
                return;
            }
        };

        if !self.mark_open(epoch, &url) {
            return;
        }

        let mut parser = SseParser::new();
        loop {
            match stream.next().await {
                Some(Ok(chunk)) => {
                    let messages = match parser.push(&chunk) {
                        Ok(messages) => messages,
                        Err(err) => {
                            self.fail(epoch, err);
                            return;
                        }
                    };
                    for message in messages {
                        if !self.is_current(epoch) {
                            return;
                        }
                        self.dispatch(&message);
                    }
                }
                Some(Err(err)) => {
                    self.fail(epoch, err);
                    return;
                }
                None => {
                    self.fail(epoch, ClientError::StreamEnded);
                    return;
                }
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.session().epoch == epoch
    }

    fn mark_open(&self, epoch: u64, url: &str) -> bool {
        {
            let mut session = self.session();
            if session.epoch != epoch {
                return false;
            }
            session.cancel_reconnect();
            self.set_state(ConnectionState::Connected);
        }

        info!(%url, "Event stream connected");
        let on_open = self.callbacks().on_open.clone();
        if let Some(on_open) = on_open {
            on_open();
        }
        true
    }

    /// Handle a transport error for `epoch`. Errors from superseded
    /// transports are ignored.
    fn fail(self: &Arc<Self>, epoch: u64, err: ClientError) {
        let retry_in = {
            let mut session = self.session();
            if session.epoch != epoch {
                debug!(epoch, error = %err, "Ignoring error from superseded transport");
                return;
            }
            if let Some(transport) = session.transport.take() {
                transport.abort();
            }

            let retry = session.active && self.reconnect;
            if retry && session.pending_reconnect.is_none() {
                session.reconnect_generation += 1;
                let generation = session.reconnect_generation;
                session.pending_reconnect = Some(self.schedule_reconnect(generation));
            }
            self.set_state(if retry {
                ConnectionState::Reconnecting
            } else {
                ConnectionState::Disconnected
            });
            retry.then_some(self.reconnect_interval)
        };

        match retry_in {
            Some(delay) => warn!(error = %err, ?delay, "Event stream error, reconnecting"),
            None => warn!(error = %err, "Event stream error"),
        }

        let on_error = self.callbacks().on_error.clone();
        if let Some(on_error) = on_error {
            on_error(&err);
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        let delay = self.reconnect_interval;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire_reconnect(generation);
        })
    }

    /// Reconnect timer body. Returns `true` if an attempt was started.
    fn fire_reconnect(self: &Arc<Self>, generation: u64) -> bool {
        let mut session = self.session();
        if session.reconnect_generation != generation {
            debug!(generation, "Ignoring cancelled reconnect timer");
            return false;
        }

        session.pending_reconnect = None;
        if !session.active {
            return false;
        }
        self.start_attempt(&mut session);
        true
    }

    fn dispatch(&self, message: &MessageEvent) {
        debug!(event = %message.event, "Event stream message");

        let on_message = self.callbacks().on_message.clone();
        if let Some(on_message) = on_message {
            run_handler(&on_message, message);
        }

        // Snapshot so handlers may add or remove listeners.
        let handlers: Vec<Handler> = self
            .listeners()
            .get(&message.event)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in &handlers {
            run_handler(handler, message);
        }
    }
}

fn run_handler(handler: &Handler, message: &MessageEvent) {
    match std::panic::catch_unwind(AssertUnwindSafe(|| handler(message))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(event = %message.event, error = %err, "Event handler failed");
        }
        Err(_) => {
            warn!(event = %message.event, "Event handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    const INTERVAL: Duration = Duration::from_secs(5);

    /// Connector whose streams are fed by the test.
    #[derive(Default)]
    struct ScriptedConnector {
        refuse: std::sync::atomic::AtomicBool,
        urls: Mutex<Vec<String>>,
        feeds: Mutex<Vec<mpsc::UnboundedSender<Result<Bytes, ClientError>>>>,
    }

    impl ScriptedConnector {
        fn refusing() -> Self {
            let connector = Self::default();
            connector.refuse.store(true, Ordering::SeqCst);
            connector
        }

        fn attempts(&self) -> usize {
            self.urls.lock().unwrap().len()
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }

        fn feed(&self, text: &str) {
            let feeds = self.feeds.lock().unwrap();
            let _ = feeds
                .last()
                .expect("no open stream")
                .send(Ok(Bytes::from(text.to_string())));
        }

        fn feed_at(&self, attempt: usize, text: &str) {
            let feeds = self.feeds.lock().unwrap();
            let _ = feeds[attempt].send(Ok(Bytes::from(text.to_string())));
        }

        fn end_stream(&self) {
            self.feeds.lock().unwrap().pop();
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn open(&self, url: &str) -> Result<ByteStream, ClientError> {
            self.urls.lock().unwrap().push(url.to_string());
            if self.refuse.load(Ordering::SeqCst) {
                return Err(ClientError::Transport("connection refused".to_string()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            self.feeds.lock().unwrap().push(tx);
            Ok(futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed())
        }
    }

    fn client_with(connector: &Arc<ScriptedConnector>) -> SubscriberClient {
        let options = SubscriberOptions::new("http://signage.test/api/sse?target=disp-1")
            .with_reconnect_interval(INTERVAL);
        SubscriberClient::with_connector(options, Arc::clone(connector) as Arc<dyn Connector>)
    }

    /// Let spawned tasks run without reaching the reconnect interval.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let read = Arc::clone(&count);
        (count, move || read.load(Ordering::SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_opens_and_reports_state() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        let (opened, open_count) = counter();
        client.on_open(move || {
            opened.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(client.state(), ConnectionState::Disconnected);
        client.connect();
        settle().await;

        assert!(client.is_connected());
        assert_eq!(open_count(), 1);
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_errors_schedule_one_reconnect() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        client.connect();
        settle().await;

        let epoch = client.inner.session().epoch;
        client
            .inner
            .fail(epoch, ClientError::Transport("first".to_string()));
        client
            .inner
            .fail(epoch, ClientError::Transport("second".to_string()));
        assert_eq!(client.state(), ConnectionState::Reconnecting);

        tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
        assert_eq!(connector.attempts(), 2);
        assert!(client.is_connected());

        tokio::time::sleep(INTERVAL * 4).await;
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connection_retries_at_fixed_interval() {
        let connector = Arc::new(ScriptedConnector::refusing());
        let client = client_with(&connector);
        let (errors, error_count) = counter();
        client.on_error(move |_| {
            errors.fetch_add(1, Ordering::SeqCst);
        });

        client.connect();
        settle().await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(client.state(), ConnectionState::Reconnecting);

        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(connector.attempts(), 3);
        assert_eq!(error_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let connector = Arc::new(ScriptedConnector::refusing());
        let client = client_with(&connector);
        client.connect();
        settle().await;
        assert_eq!(client.state(), ConnectionState::Reconnecting);

        client.disconnect();
        tokio::time::sleep(INTERVAL * 6).await;

        assert_eq!(connector.attempts(), 1);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_past_sleep_does_not_reconnect() {
        let connector = Arc::new(ScriptedConnector::refusing());
        let client = client_with(&connector);
        client.connect();
        settle().await;

        let stale = client.inner.session().reconnect_generation;
        assert_eq!(client.state(), ConnectionState::Reconnecting);

        // Timer woke up, but disconnect() won the lock first
        client.disconnect();
        assert!(!client.inner.fire_reconnect(stale));
        assert_eq!(client.state(), ConnectionState::Disconnected);

        // Same race against connect(): only the explicit attempt runs
        client.connect();
        settle().await;
        let attempts = connector.attempts();
        assert!(!client.inner.fire_reconnect(stale));
        assert_eq!(connector.attempts(), attempts);
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_timer_starts_attempt() {
        let connector = Arc::new(ScriptedConnector::refusing());
        let client = client_with(&connector);
        client.connect();
        settle().await;

        let current = client.inner.session().reconnect_generation;
        assert!(client.inner.fire_reconnect(current));
        settle().await;
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_line_drops_transport_and_reconnects() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&errors);
        client.on_error(move |err| {
            seen.lock()
                .unwrap()
                .push(matches!(err, ClientError::LineTooLong { .. }));
        });

        client.connect();
        settle().await;
        connector.feed(&"x".repeat(crate::parser::MAX_LINE_LEN + 1));
        settle().await;

        assert_eq!(*errors.lock().unwrap(), vec![true]);
        assert_eq!(client.state(), ConnectionState::Reconnecting);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(connector.attempts(), 2);
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_disabled_stays_disconnected() {
        let connector = Arc::new(ScriptedConnector::refusing());
        let options = SubscriberOptions::new("http://signage.test/api/sse").with_reconnect(false);
        let client =
            SubscriberClient::with_connector(options, Arc::clone(&connector) as Arc<dyn Connector>);

        client.connect();
        tokio::time::sleep(INTERVAL * 3).await;

        assert_eq!(connector.attempts(), 1);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_end_counts_as_error() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        let ended = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&ended);
        client.on_error(move |err| {
            seen.lock().unwrap().push(matches!(err, ClientError::StreamEnded));
        });

        client.connect();
        settle().await;
        connector.end_stream();
        settle().await;

        assert_eq!(*ended.lock().unwrap(), vec![true]);
        assert_eq!(client.state(), ConnectionState::Reconnecting);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_handler_does_not_block_others() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        let (calls, call_count) = counter();

        client.add_event_listener("control", |_| anyhow::bail!("handler failed"));
        client.add_event_listener("control", |_| panic!("handler panicked"));
        client.add_event_listener("control", move |message| {
            assert_eq!(message.data, r#"{"command":"play"}"#);
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        client.connect();
        settle().await;
        connector.feed("event: control\ndata: {\"command\":\"play\"}\n\n");
        settle().await;
        connector.feed("event: control\ndata: {\"command\":\"play\"}\n\n");
        settle().await;

        assert_eq!(call_count(), 2);
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_dispatches_nothing() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        let (messages, message_count) = counter();
        let (named, named_count) = counter();

        client.on_message(move |_| {
            messages.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        client.add_event_listener("message", move |_| {
            named.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        client.connect();
        settle().await;
        connector.feed(": keep-alive\n\n");
        settle().await;

        assert_eq!(message_count(), 0);
        assert_eq!(named_count(), 0);
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_message_sees_every_event_name() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        let names = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&names);
        client.on_message(move |message| {
            seen.lock().unwrap().push(message.event.clone());
            Ok(())
        });

        client.connect();
        settle().await;
        connector.feed("event: connected\ndata: {}\n\ndata: plain\n\nevent: ping\ndata: 1\n\n");
        settle().await;

        assert_eq!(
            *names.lock().unwrap(),
            vec!["connected".to_string(), "message".to_string(), "ping".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_listener_is_not_called() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        let (calls, call_count) = counter();

        let id = client.add_event_listener("playlist-updated", move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(client.remove_event_listener("playlist-updated", id));
        assert!(!client.remove_event_listener("playlist-updated", id));
        assert!(!client.remove_event_listener("control", id));

        client.connect();
        settle().await;
        connector.feed("event: playlist-updated\ndata: {\"playlistId\":\"pl-1\"}\n\n");
        settle().await;

        assert_eq!(call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typed_listener_receives_payload() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        client.add_typed_listener(
            "playlist-updated",
            move |payload: signage_core::PlaylistUpdatedPayload| {
                sink.lock().unwrap().push(payload.playlist_id);
                Ok(())
            },
        );

        client.connect();
        settle().await;
        connector.feed("event: playlist-updated\ndata: not json\n\n");
        connector.feed("event: playlist-updated\ndata: {\"playlistId\":\"pl-7\"}\n\n");
        settle().await;

        assert_eq!(*received.lock().unwrap(), vec!["pl-7".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_url_reconnects_and_keeps_listeners() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        let (calls, call_count) = counter();
        client.add_event_listener("control", move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        client.connect();
        settle().await;
        let old_epoch = client.inner.session().epoch;

        client.set_url("http://signage.test/api/sse?target=disp-2");
        settle().await;

        assert_eq!(
            connector.urls(),
            vec![
                "http://signage.test/api/sse?target=disp-1".to_string(),
                "http://signage.test/api/sse?target=disp-2".to_string(),
            ]
        );
        assert!(client.is_connected());

        // Frames on the superseded stream are never dispatched
        connector.feed_at(0, "event: control\ndata: {}\n\n");
        connector.feed("event: control\ndata: {}\n\n");
        settle().await;
        assert_eq!(call_count(), 1);

        // Nor do its errors schedule a retry
        client
            .inner
            .fail(old_epoch, ClientError::Transport("stale".to_string()));
        assert!(client.is_connected());
        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_url_after_disconnect_resumes() {
        let connector = Arc::new(ScriptedConnector::refusing());
        let client = client_with(&connector);
        client.connect();
        settle().await;
        client.disconnect();

        connector.refuse.store(false, Ordering::SeqCst);
        client.set_url("http://signage.test/api/sse");
        settle().await;

        assert!(client.is_connected());
        assert_eq!(client.url(), "http://signage.test/api/sse");
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_state_follows_transitions() {
        let connector = Arc::new(ScriptedConnector::default());
        let client = client_with(&connector);
        let mut state = client.watch_state();

        client.connect();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();

        client.disconnect();
        assert_eq!(*state.borrow_and_update(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_reconnecting() {
        let connector = Arc::new(ScriptedConnector::refusing());
        let client = client_with(&connector);
        client.connect();
        settle().await;

        drop(client);
        tokio::time::sleep(INTERVAL * 4).await;

        assert_eq!(connector.attempts(), 1);
    }
}
