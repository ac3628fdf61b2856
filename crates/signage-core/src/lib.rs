//! Core of the signage real-time layer.
//!
//! Holds everything that does not depend on a particular transport:
//!
//! - `events` - the closed set of stream events pushed to subscribers
//! - `frame` - one named event with its serialized payload, ready for a transport
//! - `registry` - the process-wide table of open push channels and fan-out
//! - `ports` - seams to the outside world (channel sinks, display directory)
//! - `services` - notification calls used by CRUD handlers after a write
#![deny(unused_crate_dependencies)]

pub mod events;
pub mod frame;
pub mod ports;
pub mod registry;
pub mod services;

pub use events::{
    ConnectedPayload, ControlCommand, ControlPayload, ControlRequest, DisplayStatusPayload,
    PlaylistUpdatedPayload, StreamEvent,
};
pub use frame::{Frame, FrameError};
pub use ports::{
    CoreError, DirectoryError, DisplayDirectory, FrameSink, InMemoryDisplayDirectory, SinkError,
};
pub use registry::{BroadcastRegistry, ChannelId, Delivery};
pub use services::Notifier;

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
