use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PlungeError, Result};

/// Name of the per-user state directory under `$HOME`.
pub const APP_DIR_NAME: &str = ".coldplunge";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Cold-plunge tub monitor and controller
#[derive(Parser, Debug, Clone)]
#[command(
    name = "coldplunge",
    about = "Cold-plunge tub monitor and controller",
    version
)]
pub struct Settings {
    /// Sensor backend
    #[arg(long, default_value = "simulated", value_parser = ["simulated", "sysfs"])]
    pub sensors: String,

    /// Persistence backend
    #[arg(long, default_value = "sqlite", value_parser = ["memory", "sqlite"])]
    pub store: String,

    /// SQLite database path (defaults to ~/.coldplunge/coldplunge.db)
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Seconds between temperature samples
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub temperature_interval: u64,

    /// Seconds between leak sensor polls
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..=600))]
    pub leak_interval: u64,

    /// Band (°F) around a monitor target that counts as reached
    #[arg(long, default_value = "0.5")]
    pub target_tolerance: f64,

    /// Longest ozone run accepted, in minutes
    #[arg(long, default_value = "120", value_parser = clap::value_parser!(u32).range(1..=1440))]
    pub max_ozone_minutes: u32,

    /// Notification sink
    #[arg(long, default_value = "log", value_parser = ["log", "none"])]
    pub notifier: String,

    /// Subject line attached to every notification
    #[arg(long, default_value = "Cold Plunge")]
    pub notification_subject: String,

    /// Root of the sysfs tree (sysfs backend)
    #[arg(long, default_value = "/sys")]
    pub sysfs_root: PathBuf,

    /// 1-wire id of the room probe, e.g. 28-0316a2795dff (sysfs backend)
    #[arg(long)]
    pub room_sensor: Option<String>,

    /// 1-wire id of the water probe (sysfs backend)
    #[arg(long)]
    pub water_sensor: Option<String>,

    /// GPIO line of the leak detector input
    #[arg(long, default_value = "17")]
    pub leak_pin: u32,

    /// GPIO line of the pump relay
    #[arg(long, default_value = "27")]
    pub pump_pin: u32,

    /// GPIO line of the ozone generator relay
    #[arg(long, default_value = "22")]
    pub ozone_pin: u32,

    /// Leak input reads 0 when wet
    #[arg(long)]
    pub leak_active_low: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── MonitorConfig ──────────────────────────────────────────────────────────────

/// Runtime tuning consumed by the monitor loops.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub temperature_interval: Duration,
    pub leak_interval: Duration,
    /// Band (°F) around a target that counts as reached.
    pub target_tolerance_f: f64,
    pub max_ozone_minutes: u32,
    pub notification_subject: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            temperature_interval: Duration::from_secs(30),
            leak_interval: Duration::from_secs(5),
            target_tolerance_f: 0.5,
            max_ozone_minutes: 120,
            notification_subject: "Cold Plunge".to_string(),
        }
    }
}

// ── SavedConfig ────────────────────────────────────────────────────────────────

/// Persisted configuration saved to `~/.coldplunge/config.json`.
///
/// Only installation-specific values are kept; log settings are per-run.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct SavedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leak_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_sensor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_sensor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leak_pin: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_pin: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ozone_pin: Option<u32>,
}

impl SavedConfig {
    /// Default location: `~/.coldplunge/config.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(APP_DIR_NAME).join("config.json")
    }

    /// Load from `path`, returning `Default` when absent or unparseable.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "ignoring unreadable saved config");
                Self::default()
            }
        }
    }

    /// Atomically write to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the file at `path` if it exists.
    pub fn clear_at(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with the saved config where no explicit
    /// CLI value was given, and persist the result.
    pub fn load_with_saved() -> Self {
        Self::load_with_saved_impl(std::env::args_os().collect(), &SavedConfig::config_path())
    }

    /// Same as [`Settings::load_with_saved`] with explicit arguments and
    /// config path so tests can redirect to a temporary directory.
    pub fn load_with_saved_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = SavedConfig::clear_at(config_path) {
                tracing::warn!(error = %e, "failed to clear saved config");
            }
            return settings.resolved();
        }

        let saved = SavedConfig::load_from(config_path);

        // CLI always wins over saved values.
        if !is_arg_explicitly_set(&matches, "sensors") {
            if let Some(v) = saved.sensors {
                settings.sensors = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "store") {
            if let Some(v) = saved.store {
                settings.store = v;
            }
        }
        if settings.db_path.is_none() {
            settings.db_path = saved.db_path;
        }
        if !is_arg_explicitly_set(&matches, "temperature_interval") {
            if let Some(v) = saved.temperature_interval {
                settings.temperature_interval = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "leak_interval") {
            if let Some(v) = saved.leak_interval {
                settings.leak_interval = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "notifier") {
            if let Some(v) = saved.notifier {
                settings.notifier = v;
            }
        }
        if settings.room_sensor.is_none() {
            settings.room_sensor = saved.room_sensor;
        }
        if settings.water_sensor.is_none() {
            settings.water_sensor = saved.water_sensor;
        }
        if !is_arg_explicitly_set(&matches, "leak_pin") {
            if let Some(v) = saved.leak_pin {
                settings.leak_pin = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "pump_pin") {
            if let Some(v) = saved.pump_pin {
                settings.pump_pin = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "ozone_pin") {
            if let Some(v) = saved.ozone_pin {
                settings.ozone_pin = v;
            }
        }

        let settings = settings.resolved();

        if let Err(e) = SavedConfig::from(&settings).save_to(config_path) {
            tracing::warn!(error = %e, "failed to persist config");
        }

        settings
    }

    /// Apply `--debug`.
    fn resolved(mut self) -> Self {
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    /// Reject combinations that cannot produce a working monitor.
    pub fn validate(&self) -> Result<()> {
        if self.sensors == "sysfs" && (self.room_sensor.is_none() || self.water_sensor.is_none()) {
            return Err(PlungeError::Config(
                "sysfs sensors require --room-sensor and --water-sensor".to_string(),
            ));
        }
        // Saved values bypass the clap range checks.
        if !(1..=3600).contains(&self.temperature_interval) {
            return Err(PlungeError::Config(format!(
                "temperature interval must be 1-3600 seconds, got {}",
                self.temperature_interval
            )));
        }
        if !(1..=600).contains(&self.leak_interval) {
            return Err(PlungeError::Config(format!(
                "leak interval must be 1-600 seconds, got {}",
                self.leak_interval
            )));
        }
        if !(1..=1440).contains(&self.max_ozone_minutes) {
            return Err(PlungeError::Config(format!(
                "max ozone minutes must be 1-1440, got {}",
                self.max_ozone_minutes
            )));
        }
        if !self.target_tolerance.is_finite() || self.target_tolerance < 0.0 {
            return Err(PlungeError::Config(format!(
                "target tolerance must be a non-negative number, got {}",
                self.target_tolerance
            )));
        }
        Ok(())
    }

    /// Database path, falling back to `~/.coldplunge/coldplunge.db`.
    pub fn database_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME)
                .join("coldplunge.db")
        })
    }

    /// Loop tuning derived from these settings.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            temperature_interval: Duration::from_secs(self.temperature_interval),
            leak_interval: Duration::from_secs(self.leak_interval),
            target_tolerance_f: self.target_tolerance,
            max_ozone_minutes: self.max_ozone_minutes,
            notification_subject: self.notification_subject.clone(),
        }
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for SavedConfig {
    fn from(s: &Settings) -> Self {
        SavedConfig {
            sensors: Some(s.sensors.clone()),
            store: Some(s.store.clone()),
            db_path: s.db_path.clone(),
            temperature_interval: Some(s.temperature_interval),
            leak_interval: Some(s.leak_interval),
            notifier: Some(s.notifier.clone()),
            room_sensor: s.room_sensor.clone(),
            water_sensor: s.water_sensor.clone(),
            leak_pin: Some(s.leak_pin),
            pump_pin: Some(s.pump_pin),
            ozone_pin: Some(s.ozone_pin),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line.
///
/// clap keys args by field name (underscores), not the long-flag spelling.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
