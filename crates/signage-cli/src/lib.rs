//! Command-line front end for signage.
//!
//! - `signage serve` runs the event stream server.
//! - `signage watch` attaches a subscriber to a running server and prints
//!   every frame it receives.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings for test infrastructure
#[cfg(test)]
use tokio_test as _;

// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod handlers;
pub mod parser;

pub use commands::{Commands, ServeArgs, WatchArgs};
pub use parser::Cli;
