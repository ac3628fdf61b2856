//! Services built on top of the registry and ports.

pub mod notifier;

pub use notifier::Notifier;
