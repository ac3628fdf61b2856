//! Messages delivered to subscriber callbacks and listeners.

use serde::de::DeserializeOwned;
use signage_core::StreamEvent;

/// Event name used when a frame carries no `event:` line.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One dispatched event frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Value of the `event:` line, or [`DEFAULT_EVENT_NAME`].
    pub event: String,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// Last `id:` seen on this connection, if any.
    pub last_event_id: Option<String>,
}

impl MessageEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            last_event_id: None,
        }
    }

    /// Parse the data as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.data)
    }

    /// Decode into one of the server's own events. Unknown names yield `Ok(None)`.
    pub fn stream_event(&self) -> Result<Option<StreamEvent>, serde_json::Error> {
        StreamEvent::decode(&self.event, &self.data)
    }
}
