//! Sensor gateway implementations.
//!
//! [`SimulatedSensors`] models a tub in memory for development and demos;
//! [`SysfsSensors`] talks to 1-wire probes and GPIO lines through Linux sysfs.

pub mod simulated;
pub mod sysfs;

pub use simulated::SimulatedSensors;
pub use sysfs::{discover_w1_sensors, SysfsPins, SysfsSensors};
