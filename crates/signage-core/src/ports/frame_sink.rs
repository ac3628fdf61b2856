//! Write side of one push channel.
//!
//! A sink is owned by exactly one registry entry. Writing never blocks:
//! a sink either accepts the frame immediately or reports why it cannot,
//! and the registry prunes the channel on any failure.

use std::fmt::Debug;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::frame::Frame;

/// Reasons a frame could not be written to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The reading side is gone (client disconnected, body dropped).
    #[error("channel closed")]
    Closed,

    /// The channel buffer is full; the client is not keeping up.
    #[error("channel buffer full")]
    Backpressure,
}

/// Trait for anything that accepts frames for one connection.
pub trait FrameSink: Send + Sync + Debug {
    /// Write a frame. Must not block.
    fn send_frame(&self, frame: Frame) -> Result<(), SinkError>;
}

impl FrameSink for mpsc::Sender<Frame> {
    fn send_frame(&self, frame: Frame) -> Result<(), SinkError> {
        self.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Backpressure,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}
