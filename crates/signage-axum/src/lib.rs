//! Axum web adapter for signage.
//!
//! Serves the event stream endpoint (`GET /api/sse`) backed by the core
//! broadcast registry, plus the routes that turn controller actions and
//! display reports into stream notifications.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings for test infrastructure
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tower as _;

pub mod bootstrap;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

// Re-export primary types
pub use bootstrap::{
    AxumContext, CorsConfig, ServerConfig, bootstrap, bootstrap_with_directory, start_server,
};
pub use error::HttpError;
pub use routes::create_router;
pub use sse::{ChannelLease, OpenChannel, SseHub, StreamSettings, Teardown};
pub use state::AppState;
