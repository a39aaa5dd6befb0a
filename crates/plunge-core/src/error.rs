use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the cold-plunge monitor.
#[derive(Error, Debug)]
pub enum PlungeError {
    /// A sensor could not be read.
    #[error("Sensor read failed ({sensor}): {message}")]
    Sensor {
        sensor: &'static str,
        message: String,
    },

    /// A device could not be switched.
    #[error("Actuator {device} failed: {message}")]
    Actuator {
        device: &'static str,
        message: String,
    },

    /// The persistence backend rejected or failed an operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record that was expected to exist is missing.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The notification sink could not deliver a message.
    #[error("Notification delivery failed: {0}")]
    Notification(String),

    /// A command was rejected before reaching its loop.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// `start` was called on a supervisor that is already running.
    #[error("Monitor already started")]
    AlreadyStarted,

    /// The loop owning a command channel has exited.
    #[error("Monitor is not running")]
    MonitorStopped,

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A device file could not be read or written.
    #[error("Device file {path}: {source}")]
    DeviceFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlungeError {
    /// Shorthand for a [`PlungeError::Sensor`].
    pub fn sensor(sensor: &'static str, message: impl Into<String>) -> Self {
        Self::Sensor {
            sensor,
            message: message.into(),
        }
    }

    /// Shorthand for a [`PlungeError::Actuator`].
    pub fn actuator(device: &'static str, message: impl Into<String>) -> Self {
        Self::Actuator {
            device,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the plunge crates.
pub type Result<T> = std::result::Result<T, PlungeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_sensor() {
        let err = PlungeError::sensor("water", "crc mismatch");
        assert_eq!(err.to_string(), "Sensor read failed (water): crc mismatch");
    }

    #[test]
    fn test_error_display_actuator() {
        let err = PlungeError::actuator("ozone", "gpio busy");
        assert_eq!(err.to_string(), "Actuator ozone failed: gpio busy");
    }

    #[test]
    fn test_error_display_device_file() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = PlungeError::DeviceFile {
            path: PathBuf::from("/sys/class/gpio/gpio17/value"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("/sys/class/gpio/gpio17/value"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_invalid_command() {
        let err = PlungeError::InvalidCommand("duration must be positive".to_string());
        assert_eq!(err.to_string(), "Invalid command: duration must be positive");
    }

    #[test]
    fn test_error_display_lifecycle() {
        assert_eq!(PlungeError::AlreadyStarted.to_string(), "Monitor already started");
        assert_eq!(PlungeError::MonitorStopped.to_string(), "Monitor is not running");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PlungeError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: PlungeError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
