//! Subscriber side of the signage event stream.
//!
//! [`SubscriberClient`] opens `GET /api/sse`, parses the frames and routes
//! them to per-event listeners, reconnecting at a fixed interval after any
//! transport error until it is told to stop.
//!
//! ```no_run
//! use signage_client::{SubscriberClient, SubscriberOptions};
//! use signage_core::ControlPayload;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = SubscriberClient::new(SubscriberOptions::new(
//!     "http://localhost:3000/api/sse?target=lobby",
//! ))?;
//! client.add_typed_listener("control", |payload: ControlPayload| {
//!     println!("command: {}", payload.command);
//!     Ok(())
//! });
//! client.connect();
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings for test infrastructure
#[cfg(test)]
use axum as _;
#[cfg(test)]
use signage_axum as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tokio_util as _;

pub mod connector;
pub mod error;
pub mod message;
pub mod parser;
pub mod subscriber;

pub use connector::{ByteStream, Connector, HttpConnector};
pub use error::ClientError;
pub use message::{DEFAULT_EVENT_NAME, MessageEvent};
pub use parser::SseParser;
pub use subscriber::{
    ConnectionState, DEFAULT_RECONNECT_INTERVAL, ListenerId, SubscriberClient, SubscriberOptions,
};
