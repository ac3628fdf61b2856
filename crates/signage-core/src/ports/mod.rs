//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP framework types in any signature
//! - The display directory only answers lookups; it never exposes schema
//! - Sinks accept already-serialized frames and never block

pub mod display_directory;
pub mod frame_sink;

use thiserror::Error;

pub use display_directory::{DirectoryError, DisplayDirectory, InMemoryDisplayDirectory};
pub use frame_sink::{FrameSink, SinkError};

/// Core error type for semantic domain errors.
///
/// This is the canonical error type used across the core domain.
/// Adapters should map this to their own error types (HTTP status codes,
/// CLI exit codes).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Display directory lookup failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Validation error (invalid input).
    #[error("Validation error: {0}")]
    Validation(String),
}
