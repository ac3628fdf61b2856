//! One unit of the event stream: a named event with a JSON payload.
//!
//! The core never writes wire bytes. A [`Frame`] carries the event name and
//! the already-serialized payload; the HTTP adapter turns it into
//!
//! ```text
//! event: control
//! data: {"command":"play"}
//!
//! ```
//!
//! Payloads are serialized once per fan-out and shared by every channel,
//! so both fields are reference counted.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// Comment text the stream endpoint writes between events.
pub const KEEP_ALIVE_COMMENT: &str = "keep-alive";

/// Errors raised while building a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Event names end up on a single `event:` line.
    #[error("Invalid event name {0:?}: must not be empty or contain line breaks")]
    InvalidEventName(String),

    /// Payload could not be serialized to JSON.
    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A named event with its JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    event: Arc<str>,
    data: Arc<str>,
}

impl Frame {
    /// Serialize `payload` under the event name `name`.
    pub fn event<T: Serialize + ?Sized>(name: &str, payload: &T) -> Result<Self, FrameError> {
        if name.is_empty() || name.contains(['\r', '\n']) {
            return Err(FrameError::InvalidEventName(name.to_string()));
        }

        let data = serde_json::to_string(payload)?;
        Ok(Self {
            event: Arc::from(name),
            data: Arc::from(data),
        })
    }

    pub fn event_name(&self) -> &str {
        &self.event
    }

    /// The payload as a JSON string.
    pub fn data(&self) -> &str {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_frame_fields() {
        let frame = Frame::event("control", &json!({"command": "play"})).unwrap();
        assert_eq!(frame.event_name(), "control");
        assert_eq!(frame.data(), r#"{"command":"play"}"#);
    }

    #[test]
    fn test_rejects_multiline_event_name() {
        let err = Frame::event("a\nb", &json!({})).unwrap_err();
        assert!(matches!(err, FrameError::InvalidEventName(_)));

        let err = Frame::event("a\rb", &json!({})).unwrap_err();
        assert!(matches!(err, FrameError::InvalidEventName(_)));

        let err = Frame::event("", &json!({})).unwrap_err();
        assert!(matches!(err, FrameError::InvalidEventName(_)));
    }

    #[test]
    fn test_payload_newlines_are_escaped() {
        let frame = Frame::event("note", &json!({"text": "line1\nline2"})).unwrap();
        assert!(!frame.data().contains('\n'));
        assert_eq!(frame.data(), r#"{"text":"line1\nline2"}"#);
    }

    #[test]
    fn test_clones_share_payload() {
        let frame = Frame::event("note", &json!({"n": 1})).unwrap();
        let copy = frame.clone();
        assert!(Arc::ptr_eq(&frame.data, &copy.data));
    }
}
