//! Shared building blocks for the cold-plunge monitor.
//!
//! Holds the data model, the error type, the capability traits the runtime
//! consumes, and the daemon settings.

pub mod error;
pub mod gateways;
pub mod models;
pub mod settings;

pub use error::{PlungeError, Result};
