//! Incremental parser for `text/event-stream` bodies.
//!
//! Chunks arrive with arbitrary boundaries, so bytes are buffered until a
//! full line is available. A blank line ends a frame:
//!
//! ```text
//! event: control          <- sets the event name
//! data: {"command":"play"} <- appended to the data buffer
//! : keep-alive            <- comment, ignored
//!                         <- blank line: dispatch
//! ```
//!
//! Frames without any `data:` line are dropped, which is what keeps the
//! server's keep-alive comments away from handlers.
//!
//! A pending line longer than [`MAX_LINE_LEN`] is a transport error: the
//! buffer is discarded and the caller is expected to drop the connection.

use bytes::BytesMut;

use crate::error::ClientError;
use crate::message::{DEFAULT_EVENT_NAME, MessageEvent};

/// Longest line accepted, in bytes, including the line break.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Stateful line parser. One instance per connection.
#[derive(Debug, Default)]
pub struct SseParser {
    buf: BytesMut,
    event: Option<String>,
    data: Vec<String>,
    last_event_id: Option<String>,
    retry: Option<u64>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes.
    ///
    /// Fails with [`ClientError::LineTooLong`] once a line exceeds
    /// [`MAX_LINE_LEN`]; frames completed earlier in the same chunk are lost
    /// with it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<MessageEvent>, ClientError> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(line_end) = find_newline(&self.buf) {
            if line_end > MAX_LINE_LEN {
                return Err(self.overflow());
            }
            let line = self.buf.split_to(line_end);
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(message) = self.process_line(text) {
                out.push(message);
            }
        }

        if self.buf.len() > MAX_LINE_LEN {
            return Err(self.overflow());
        }
        Ok(out)
    }

    /// Last `id:` value seen on this connection.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Last `retry:` value in milliseconds. Recorded, not acted on.
    pub const fn retry_ms(&self) -> Option<u64> {
        self.retry
    }

    fn overflow(&mut self) -> ClientError {
        self.buf.clear();
        self.event = None;
        self.data.clear();
        ClientError::LineTooLong {
            limit: MAX_LINE_LEN,
        }
    }

    fn process_line(&mut self, line: &str) -> Option<MessageEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<MessageEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(MessageEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            data,
            last_event_id: self.last_event_id.clone(),
        })
    }
}

fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}
