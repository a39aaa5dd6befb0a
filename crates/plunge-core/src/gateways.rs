//! Capability traits consumed by the monitor runtime.
//!
//! Sensor hardware, durable storage and message delivery sit behind these
//! traits. The runtime is generic over them, so the implementation (real
//! hardware or simulation, SQLite or memory) is fixed once at construction.
//!
//! Every method returns a `Send` future so implementations can be driven from
//! spawned tokio tasks; implementors may simply write `async fn`.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{LeakRecord, OzoneEntry, TemperatureSample};

// ── Sensors and actuators ─────────────────────────────────────────────────────

/// Temperature probes, the leak sensor, and the pump/ozone power switches.
pub trait SensorGateway: Send + Sync + 'static {
    /// Read room and water temperature (°F). Each reading fails independently.
    fn read_room_and_water_temperature(
        &self,
    ) -> impl Future<Output = (Result<f64>, Result<f64>)> + Send;

    fn is_leak_present(&self) -> impl Future<Output = Result<bool>> + Send;

    fn turn_pump_on(&self) -> impl Future<Output = Result<()>> + Send;

    fn turn_pump_off(&self) -> impl Future<Output = Result<()>> + Send;

    fn is_pump_on(&self) -> impl Future<Output = Result<bool>> + Send;

    fn turn_ozone_on(&self) -> impl Future<Output = Result<()>> + Send;

    fn turn_ozone_off(&self) -> impl Future<Output = Result<()>> + Send;
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// Durable storage for samples, ozone runs and leak intervals.
pub trait PersistenceGateway: Send + Sync + 'static {
    fn save_temperature_sample(
        &self,
        room_temp_f: Option<f64>,
        water_temp_f: Option<f64>,
    ) -> impl Future<Output = Result<TemperatureSample>> + Send;

    /// Most recently started ozone entry, if any.
    fn get_latest_ozone_entry(&self) -> impl Future<Output = Result<Option<OzoneEntry>>> + Send;

    /// Insert a running entry.
    fn start_ozone_entry(
        &self,
        start_time: DateTime<Utc>,
        duration_minutes: u32,
    ) -> impl Future<Output = Result<OzoneEntry>> + Send;

    /// Mark an entry stopped now.
    fn stop_ozone_entry(&self, id: i64) -> impl Future<Output = Result<OzoneEntry>> + Send;

    fn update_ozone_entry_status(
        &self,
        id: i64,
        status: &str,
    ) -> impl Future<Output = Result<OzoneEntry>> + Send;

    /// Most recently detected leak, if any.
    fn get_latest_leak_record(&self) -> impl Future<Output = Result<Option<LeakRecord>>> + Send;

    fn create_leak_record(
        &self,
        detected_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<LeakRecord>> + Send;

    /// Set `cleared_at` to now.
    fn clear_leak_record(&self, id: i64) -> impl Future<Output = Result<LeakRecord>> + Send;
}

// ── Notifications ─────────────────────────────────────────────────────────────

/// Best-effort outbound message delivery (SMS, push, log...).
pub trait NotificationSink: Send + Sync + 'static {
    fn send(&self, subject: &str, message: &str) -> impl Future<Output = Result<()>> + Send;
}
