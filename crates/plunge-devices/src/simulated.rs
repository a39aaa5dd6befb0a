//! In-memory tub model.
//!
//! Water temperature drifts toward the chiller setpoint while the pump runs
//! and back toward room temperature while it is off, one step per read. Leak
//! state and temperatures can be overridden from the operator console.

use parking_lot::Mutex;
use plunge_core::gateways::SensorGateway;
use plunge_core::Result;

// ── Defaults ──────────────────────────────────────────────────────────────────

const DEFAULT_ROOM_F: f64 = 72.0;
const DEFAULT_WATER_F: f64 = 58.0;
const DEFAULT_CHILL_SETPOINT_F: f64 = 45.0;

/// °F the water cools per read while the pump runs.
const CHILL_STEP_F: f64 = 0.25;
/// °F the water warms per read while the pump is off.
const WARM_STEP_F: f64 = 0.05;

// ── SimulatedSensors ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct TubModel {
    room_f: f64,
    water_f: f64,
    chill_setpoint_f: f64,
    leak: bool,
    pump_on: bool,
    ozone_on: bool,
}

impl TubModel {
    fn step(&mut self) {
        let (toward, step) = if self.pump_on {
            (self.chill_setpoint_f, CHILL_STEP_F)
        } else {
            (self.room_f, WARM_STEP_F)
        };
        let delta = toward - self.water_f;
        self.water_f += delta.clamp(-step, step);
    }
}

/// Simulated sensor gateway.
#[derive(Debug)]
pub struct SimulatedSensors {
    model: Mutex<TubModel>,
}

impl SimulatedSensors {
    pub fn new(room_f: f64, water_f: f64, chill_setpoint_f: f64) -> Self {
        Self {
            model: Mutex::new(TubModel {
                room_f,
                water_f,
                chill_setpoint_f,
                leak: false,
                pump_on: false,
                ozone_on: false,
            }),
        }
    }

    pub fn set_leak(&self, present: bool) {
        self.model.lock().leak = present;
    }

    pub fn set_water_temperature(&self, water_f: f64) {
        self.model.lock().water_f = water_f;
    }

    pub fn set_room_temperature(&self, room_f: f64) {
        self.model.lock().room_f = room_f;
    }

    /// Current ozone power, without going through the async gateway.
    pub fn ozone_powered(&self) -> bool {
        self.model.lock().ozone_on
    }

    /// Current pump power, without going through the async gateway.
    pub fn pump_powered(&self) -> bool {
        self.model.lock().pump_on
    }
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_F, DEFAULT_WATER_F, DEFAULT_CHILL_SETPOINT_F)
    }
}

impl SensorGateway for SimulatedSensors {
    async fn read_room_and_water_temperature(&self) -> (Result<f64>, Result<f64>) {
        let mut model = self.model.lock();
        model.step();
        (Ok(model.room_f), Ok(model.water_f))
    }

    async fn is_leak_present(&self) -> Result<bool> {
        Ok(self.model.lock().leak)
    }

    async fn turn_pump_on(&self) -> Result<()> {
        self.model.lock().pump_on = true;
        tracing::debug!("simulated pump on");
        Ok(())
    }

    async fn turn_pump_off(&self) -> Result<()> {
        self.model.lock().pump_on = false;
        tracing::debug!("simulated pump off");
        Ok(())
    }

    async fn is_pump_on(&self) -> Result<bool> {
        Ok(self.model.lock().pump_on)
    }

    async fn turn_ozone_on(&self) -> Result<()> {
        self.model.lock().ozone_on = true;
        tracing::debug!("simulated ozone on");
        Ok(())
    }

    async fn turn_ozone_off(&self) -> Result<()> {
        self.model.lock().ozone_on = false;
        tracing::debug!("simulated ozone off");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_water_cools_while_pump_runs() {
        let sensors = SimulatedSensors::new(70.0, 50.0, 45.0);
        sensors.turn_pump_on().await.unwrap();

        let (_, first) = sensors.read_room_and_water_temperature().await;
        let (_, second) = sensors.read_room_and_water_temperature().await;
        assert!((first.unwrap() - 49.75).abs() < 1e-9);
        assert!((second.unwrap() - 49.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_water_warms_toward_room_when_pump_off() {
        let sensors = SimulatedSensors::new(70.0, 69.98, 45.0);
        let (room, water) = sensors.read_room_and_water_temperature().await;
        assert!((room.unwrap() - 70.0).abs() < 1e-9);
        // Does not overshoot room temperature.
        assert!((water.unwrap() - 70.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_water_settles_at_setpoint() {
        let sensors = SimulatedSensors::new(70.0, 45.1, 45.0);
        sensors.turn_pump_on().await.unwrap();
        let (_, water) = sensors.read_room_and_water_temperature().await;
        assert!((water.unwrap() - 45.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_leak_override() {
        let sensors = SimulatedSensors::default();
        assert!(!sensors.is_leak_present().await.unwrap());
        sensors.set_leak(true);
        assert!(sensors.is_leak_present().await.unwrap());
    }

    #[tokio::test]
    async fn test_actuators_track_power() {
        let sensors = SimulatedSensors::default();
        sensors.turn_ozone_on().await.unwrap();
        assert!(sensors.ozone_powered());
        sensors.turn_ozone_off().await.unwrap();
        assert!(!sensors.ozone_powered());

        sensors.turn_pump_on().await.unwrap();
        assert!(sensors.is_pump_on().await.unwrap());
        sensors.turn_pump_off().await.unwrap();
        assert!(!sensors.pump_powered());
    }
}
