//! State shared between the monitor loops.
//!
//! One mutex guards everything; it is only ever held for the short merge step
//! inside these methods and never across an `.await`. Readers get owned
//! [`StatusSnapshot`] copies, never references into live state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use plunge_core::models::{LeakRecord, OzoneRunState, TemperatureMonitorTarget};
use serde::Serialize;

// ── StatusSnapshot ────────────────────────────────────────────────────────────

/// Point-in-time copy of the monitor state, used to compose status responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    /// Room temperature from the latest tick (`None` if that read failed).
    pub room_temp_f: Option<f64>,
    /// Water temperature from the latest tick (`None` if that read failed).
    pub water_temp_f: Option<f64>,
    pub last_sample_at: Option<DateTime<Utc>>,
    pub ozone: OzoneRunState,
    /// Whole seconds left in the current ozone run.
    pub ozone_remaining_secs: Option<i64>,
    pub leak_present: bool,
    pub latest_leak: Option<LeakRecord>,
    pub target: Option<TemperatureMonitorTarget>,
}

// ── SharedState ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MonitorState {
    room_temp_f: Option<f64>,
    water_temp_f: Option<f64>,
    last_sample_at: Option<DateTime<Utc>>,
    ozone: OzoneRunState,
    leak_present: bool,
    latest_leak: Option<LeakRecord>,
    target: Option<TemperatureMonitorTarget>,
}

/// Cloneable handle to the shared monitor state.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<MonitorState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Readers ───────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.inner.lock();
        StatusSnapshot {
            room_temp_f: state.room_temp_f,
            water_temp_f: state.water_temp_f,
            last_sample_at: state.last_sample_at,
            ozone: state.ozone.clone(),
            ozone_remaining_secs: state.ozone.remaining(Utc::now()).map(|d| d.num_seconds()),
            leak_present: state.leak_present,
            latest_leak: state.latest_leak.clone(),
            target: state.target,
        }
    }

    /// Cached `(room, water)` temperatures in °F.
    pub fn temperatures(&self) -> (Option<f64>, Option<f64>) {
        let state = self.inner.lock();
        (state.room_temp_f, state.water_temp_f)
    }

    pub fn ozone_running(&self) -> bool {
        self.inner.lock().ozone.running
    }

    pub fn ozone_remaining(&self) -> Option<chrono::Duration> {
        self.inner.lock().ozone.remaining(Utc::now())
    }

    pub fn ozone(&self) -> OzoneRunState {
        self.inner.lock().ozone.clone()
    }

    pub fn target(&self) -> Option<TemperatureMonitorTarget> {
        self.inner.lock().target
    }

    // ── Writers (one per owning loop) ─────────────────────────────────────

    pub(crate) fn record_temperatures(
        &self,
        room_temp_f: Option<f64>,
        water_temp_f: Option<f64>,
        at: DateTime<Utc>,
    ) {
        let mut state = self.inner.lock();
        state.room_temp_f = room_temp_f;
        state.water_temp_f = water_temp_f;
        state.last_sample_at = Some(at);
    }

    /// Arm a new monitor target, replacing any previous one.
    pub(crate) fn arm_target(&self, target_temp_f: f64) {
        self.inner.lock().target = Some(TemperatureMonitorTarget::armed(target_temp_f));
    }

    pub(crate) fn clear_target(&self) {
        self.inner.lock().target = None;
    }

    /// If an armed target is reached by `water_temp_f`, disarm it and return
    /// it. Check and disarm happen under one lock, so a target fires once.
    pub(crate) fn take_reached_target(
        &self,
        water_temp_f: f64,
        tolerance_f: f64,
    ) -> Option<TemperatureMonitorTarget> {
        let mut state = self.inner.lock();
        let target = state.target.as_mut()?;
        if !target.active || !target.is_reached(water_temp_f, tolerance_f) {
            return None;
        }
        target.active = false;
        Some(*target)
    }

    pub(crate) fn set_ozone(&self, ozone: OzoneRunState) {
        self.inner.lock().ozone = ozone;
    }

    pub(crate) fn set_leak_present(&self, present: bool) {
        self.inner.lock().leak_present = present;
    }

    pub(crate) fn set_latest_leak(&self, record: Option<LeakRecord>) {
        self.inner.lock().latest_leak = record;
    }

    /// Drop all process-scoped values.
    pub(crate) fn reset(&self) {
        *self.inner.lock() = MonitorState::default();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
