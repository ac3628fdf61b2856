//! Command handlers.
//!
//! Each handler takes its parsed arguments plus the process shutdown token
//! and runs until the command finishes or the token is cancelled.

pub mod serve;
pub mod watch;
