//! Error types for the subscriber client.

use thiserror::Error;

/// Failures observed on the subscriber transport.
///
/// Every variant ends the current connection. Whether a new one follows is
/// up to the subscriber's reconnect policy, not the error kind.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the body failed mid-stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// The server answered, but not with an event stream.
    #[error("unexpected content type: {0}")]
    ContentType(String),

    /// A line grew past the parser's limit without a line break.
    #[error("event stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// The server closed the stream.
    #[error("event stream ended")]
    StreamEnded,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
