//! Concurrent monitor runtime for the cold plunge.
//!
//! [`MonitorSupervisor`] runs four tokio tasks: ozone run control, leak
//! polling, temperature sampling and notification delivery. They share one
//! [`SharedState`] and stop together through a single cancellation token.

pub mod commands;
mod leak_loop;
mod notification_loop;
pub mod notifier;
mod ozone_loop;
pub mod state;
pub mod supervisor;
mod temperature_loop;

#[cfg(test)]
mod testing;

pub use commands::{OzoneCommand, OzoneControl, TemperatureControl};
pub use notifier::LogNotifier;
pub use state::{SharedState, StatusSnapshot};
pub use supervisor::MonitorSupervisor;
