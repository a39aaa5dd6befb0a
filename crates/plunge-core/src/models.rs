use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Convert a Celsius reading to Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

// ── Temperature ───────────────────────────────────────────────────────────────

/// One persisted temperature sample. Either reading may be missing when its
/// sensor failed on that tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSample {
    /// Row identifier assigned by the store.
    pub id: i64,
    /// Room (air) temperature in °F.
    pub room_temp_f: Option<f64>,
    /// Water temperature in °F.
    pub water_temp_f: Option<f64>,
    /// When the sample was persisted.
    pub timestamp: DateTime<Utc>,
}

/// A user-specified water temperature that triggers one notification when
/// reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureMonitorTarget {
    pub target_temp_f: f64,
    pub active: bool,
}

impl TemperatureMonitorTarget {
    /// An armed target.
    pub fn armed(target_temp_f: f64) -> Self {
        Self {
            target_temp_f,
            active: true,
        }
    }

    /// `true` when `water_temp_f` lies within `tolerance_f` of the target.
    pub fn is_reached(&self, water_temp_f: f64, tolerance_f: f64) -> bool {
        (water_temp_f - self.target_temp_f).abs() <= tolerance_f
    }
}

// ── Ozone ─────────────────────────────────────────────────────────────────────

/// Persisted row describing one ozone run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OzoneEntry {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    /// Set when the run was stopped.
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub running: bool,
    pub status_message: String,
}

/// In-memory view of the current (or most recent) ozone run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OzoneRunState {
    pub running: bool,
    pub start_time: Option<DateTime<Utc>>,
    /// Scheduled end while running, actual end once stopped.
    pub end_time: Option<DateTime<Utc>>,
    pub expected_duration_minutes: u32,
    pub status_message: String,
}

impl OzoneRunState {
    /// State before any run has been seen.
    pub fn idle() -> Self {
        Self {
            running: false,
            start_time: None,
            end_time: None,
            expected_duration_minutes: 0,
            status_message: "Idle".to_string(),
        }
    }

    /// State of a run that has just begun.
    pub fn started(start_time: DateTime<Utc>, duration_minutes: u32, status: &str) -> Self {
        Self {
            running: true,
            start_time: Some(start_time),
            end_time: Some(start_time + Duration::minutes(i64::from(duration_minutes))),
            expected_duration_minutes: duration_minutes,
            status_message: status.to_string(),
        }
    }

    /// Display state rebuilt from a persisted entry.
    ///
    /// Never reports `running`: a row left open by a previous process says
    /// nothing about whether the generator is actually powered now.
    pub fn from_persisted(entry: &OzoneEntry) -> Self {
        Self {
            running: false,
            start_time: Some(entry.start_time),
            end_time: entry.end_time,
            expected_duration_minutes: entry.duration_minutes,
            status_message: entry.status_message.clone(),
        }
    }

    /// Time left in the current run, `None` when idle.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.running {
            return None;
        }
        let end = self.end_time?;
        Some((end - now).max(Duration::zero()))
    }
}

impl Default for OzoneRunState {
    fn default() -> Self {
        Self::idle()
    }
}

// ── Leaks ─────────────────────────────────────────────────────────────────────

/// Persisted interval during which a leak was sensed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakRecord {
    pub id: i64,
    pub detected_at: DateTime<Utc>,
    pub cleared_at: Option<DateTime<Utc>>,
}

impl LeakRecord {
    /// `true` while the leak has not been cleared.
    pub fn is_open(&self) -> bool {
        self.cleared_at.is_none()
    }
}

// ── Notifications ─────────────────────────────────────────────────────────────

/// A message queued for the notification sink. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTask {
    pub message: String,
}

impl NotificationTask {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
