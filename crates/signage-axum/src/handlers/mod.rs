//! HTTP request handlers for the Axum web server.
//!
//! Each submodule contains handlers for a specific API area.
//! Handlers are thin wrappers that delegate to the hub or the notifier.

pub mod displays;
pub mod events;
pub mod playlists;
