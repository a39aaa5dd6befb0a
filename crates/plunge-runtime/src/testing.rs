//! Test doubles for the runtime loops.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use plunge_core::gateways::{NotificationSink, SensorGateway};
use plunge_core::{PlungeError, Result};
use tokio::sync::{Notify, Semaphore};

// ── ScriptedSensors ───────────────────────────────────────────────────────────

/// Sensor double that replays scripted readings.
///
/// Each script entry is consumed by one read; once a script runs dry the last
/// entry repeats. `None` entries fail the read.
#[derive(Default)]
pub(crate) struct ScriptedSensors {
    leak: Mutex<Script<bool>>,
    water: Mutex<Script<f64>>,
    room: Mutex<Script<f64>>,
    pub pump_on: AtomicBool,
    pub pump_off_calls: AtomicUsize,
    pub fail_pump_off: AtomicBool,
    pub ozone_on: AtomicBool,
    pub ozone_on_calls: AtomicUsize,
    pub ozone_off_calls: AtomicUsize,
    pub fail_ozone_on: AtomicBool,
    pub fail_ozone_off: AtomicBool,
    leak_gate: Option<LeakGate>,
}

#[derive(Default)]
struct Script<T> {
    pending: VecDeque<Option<T>>,
    last: Option<Option<T>>,
}

impl<T: Copy> Script<T> {
    fn next(&mut self) -> Option<Option<T>> {
        if let Some(value) = self.pending.pop_front() {
            self.last = Some(value);
        }
        self.last
    }
}

/// Holds leak reads until the test releases them.
pub(crate) struct LeakGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Semaphore>,
}

impl ScriptedSensors {
    pub fn with_leak_script(script: &[Option<bool>]) -> Self {
        let sensors = Self::default();
        sensors.leak.lock().pending = script.iter().copied().collect();
        sensors
    }

    pub fn with_water_script(room: Option<f64>, water: &[Option<f64>]) -> Self {
        let sensors = Self::default();
        sensors.room.lock().pending = VecDeque::from([room]);
        sensors.water.lock().pending = water.iter().copied().collect();
        sensors
    }

    /// Every leak read waits for a permit on the returned semaphore.
    pub fn with_gated_leak_reads() -> (Self, Arc<Notify>, Arc<Semaphore>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Semaphore::new(0));
        let sensors = Self {
            leak_gate: Some(LeakGate {
                entered: Arc::clone(&entered),
                release: Arc::clone(&release),
            }),
            ..Self::default()
        };
        (sensors, entered, release)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn scripted<T: Copy>(script: &Mutex<Script<T>>, sensor: &'static str, fallback: T) -> Result<T> {
    match script.lock().next() {
        Some(Some(value)) => Ok(value),
        Some(None) => Err(PlungeError::sensor(sensor, "scripted failure")),
        None => Ok(fallback),
    }
}

impl SensorGateway for ScriptedSensors {
    async fn read_room_and_water_temperature(&self) -> (Result<f64>, Result<f64>) {
        (
            scripted(&self.room, "room", 72.0),
            scripted(&self.water, "water", 60.0),
        )
    }

    async fn is_leak_present(&self) -> Result<bool> {
        if let Some(gate) = &self.leak_gate {
            gate.entered.notify_one();
            gate.release
                .acquire()
                .await
                .expect("gate semaphore open")
                .forget();
        }
        scripted(&self.leak, "leak", false)
    }

    async fn turn_pump_on(&self) -> Result<()> {
        self.pump_on.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn turn_pump_off(&self) -> Result<()> {
        self.pump_off_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pump_off.load(Ordering::SeqCst) {
            return Err(PlungeError::actuator("pump", "relay stuck"));
        }
        self.pump_on.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_pump_on(&self) -> Result<bool> {
        Ok(self.pump_on.load(Ordering::SeqCst))
    }

    async fn turn_ozone_on(&self) -> Result<()> {
        self.ozone_on_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ozone_on.load(Ordering::SeqCst) {
            return Err(PlungeError::actuator("ozone", "relay stuck"));
        }
        self.ozone_on.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn turn_ozone_off(&self) -> Result<()> {
        self.ozone_off_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ozone_off.load(Ordering::SeqCst) {
            return Err(PlungeError::actuator("ozone", "relay stuck"));
        }
        self.ozone_on.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct SinkLog {
    sent: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Sink double recording every delivery attempt, failed ones included.
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    log: Arc<SinkLog>,
    delay: Option<Duration>,
    fail_on: Option<String>,
}

impl RecordingSink {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn failing_on(message: &str) -> Self {
        Self {
            fail_on: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.log.sent.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.log.sent.lock().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.log.max_in_flight.load(Ordering::SeqCst)
    }
}

impl NotificationSink for RecordingSink {
    async fn send(&self, subject: &str, message: &str) -> Result<()> {
        let now = self.log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log
            .sent
            .lock()
            .push((subject.to_string(), message.to_string()));

        self.log.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.as_deref() == Some(message) {
            return Err(PlungeError::Notification("scripted failure".to_string()));
        }
        Ok(())
    }
}
