//! Periodic temperature sampling and the water-temperature target alert.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use plunge_core::gateways::{PersistenceGateway, SensorGateway};
use plunge_core::Result;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::commands::TargetRequest;
use crate::notification_loop::NotificationQueue;
use crate::state::SharedState;

pub(crate) struct TemperatureLoop<S, P> {
    pub sensors: Arc<S>,
    pub store: Arc<P>,
    pub state: SharedState,
    pub notifications: NotificationQueue,
    pub interval: Duration,
    pub tolerance_f: f64,
}

fn reading(result: Result<f64>, probe: &'static str) -> Option<f64> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, probe, "temperature read failed");
            None
        }
    }
}

impl<S: SensorGateway, P: PersistenceGateway> TemperatureLoop<S, P> {
    /// Sample on every tick (the first one immediately) and apply target
    /// commands as they arrive. A new target replaces the previous one.
    pub(crate) async fn run(
        self,
        mut targets: mpsc::Receiver<TargetRequest>,
        cancel: CancellationToken,
    ) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut targets_open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                request = targets.recv(), if targets_open => match request {
                    Some(TargetRequest { target_temp_f, applied }) => {
                        match target_temp_f {
                            Some(target_temp_f) => {
                                self.state.arm_target(target_temp_f);
                                tracing::info!(target_temp_f, "water temperature target armed");
                            }
                            None => {
                                self.state.clear_target();
                                tracing::info!("water temperature target cleared");
                            }
                        }
                        let _ = applied.send(());
                    }
                    None => {
                        tracing::debug!("temperature target channel closed");
                        targets_open = false;
                    }
                },
                _ = ticker.tick() => self.sample().await,
            }
        }

        tracing::info!("temperature loop stopped");
    }

    async fn sample(&self) {
        let (room, water) = self.sensors.read_room_and_water_temperature().await;
        let room = reading(room, "room");
        let water = reading(water, "water");

        if let Err(e) = self.store.save_temperature_sample(room, water).await {
            tracing::warn!(error = %e, "failed to save temperature sample");
        }
        self.state.record_temperatures(room, water, Utc::now());
        tracing::debug!(?room, ?water, "temperature sampled");

        let Some(water) = water else { return };
        if let Some(target) = self.state.take_reached_target(water, self.tolerance_f) {
            tracing::info!(water, target = target.target_temp_f, "water temperature target reached");
            self.notifications
                .push(format!(
                    "Water temperature reached {water:.1}°F (target {:.1}°F)",
                    target.target_temp_f
                ));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{TemperatureControl, COMMAND_CHANNEL_CAPACITY};
    use crate::notification_loop::NOTIFICATION_CHANNEL_CAPACITY;
    use crate::testing::ScriptedSensors;
    use plunge_core::models::NotificationTask;
    use plunge_store::MemoryStore;
    use tokio::task::JoinHandle;

    const INTERVAL: Duration = Duration::from_secs(30);

    // ── helpers ──

    struct Harness {
        control: TemperatureControl,
        state: SharedState,
        store: Arc<MemoryStore>,
        notes: mpsc::Receiver<NotificationTask>,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    }

    impl Harness {
        fn spawn(sensors: ScriptedSensors) -> Self {
            let store = Arc::new(MemoryStore::new());
            let state = SharedState::new();
            let (note_tx, notes) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
            let cancel = CancellationToken::new();

            let temperature_loop = TemperatureLoop {
                sensors: Arc::new(sensors),
                store: Arc::clone(&store),
                state: state.clone(),
                notifications: NotificationQueue::new(note_tx),
                interval: INTERVAL,
                tolerance_f: 0.5,
            };
            let handle = tokio::spawn(temperature_loop.run(rx, cancel.clone()));

            Self {
                control: TemperatureControl::new(tx),
                state,
                store,
                notes,
                cancel,
                handle,
            }
        }

        /// Let `samples` ticks elapse (the first is immediate), then stop.
        async fn finish_after(mut self, samples: u32) -> (SharedState, Arc<MemoryStore>, Vec<String>) {
            time::sleep(INTERVAL * (samples - 1) + INTERVAL / 2).await;
            self.cancel.cancel();
            self.handle.await.unwrap();

            let mut messages = Vec::new();
            while let Ok(task) = self.notes.try_recv() {
                messages.push(task.message);
            }
            (self.state, self.store, messages)
        }
    }

    // ── target alert ──

    #[tokio::test(start_paused = true)]
    async fn test_target_notifies_once() {
        let sensors = ScriptedSensors::with_water_script(
            Some(72.0),
            &[Some(69.0), Some(70.3), Some(70.4), Some(69.0)],
        );
        let h = Harness::spawn(sensors);
        h.control.set_target(70.0).await.unwrap();

        let (state, _, messages) = h.finish_after(4).await;

        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("70.3"), "{}", messages[0]);
        assert!(!state.target().unwrap().active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_target_replaces_old() {
        let sensors = ScriptedSensors::with_water_script(
            Some(72.0),
            &[Some(55.0), Some(60.0), Some(50.0)],
        );
        let h = Harness::spawn(sensors);
        h.control.set_target(50.0).await.unwrap();
        h.control.set_target(60.0).await.unwrap();

        // 50.0 on the last tick no longer matters.
        let (state, _, messages) = h.finish_after(3).await;

        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("target 60.0"), "{}", messages[0]);
        assert!(!state.target().unwrap().active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_target_stays_silent() {
        let sensors = ScriptedSensors::with_water_script(Some(72.0), &[Some(58.0), Some(55.0)]);
        let h = Harness::spawn(sensors);
        h.control.set_target(55.0).await.unwrap();
        h.control.clear_target().await.unwrap();

        let (state, _, messages) = h.finish_after(2).await;

        assert!(messages.is_empty());
        assert!(state.target().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_water_read_never_fires_target() {
        let sensors = ScriptedSensors::with_water_script(Some(72.0), &[None]);
        let h = Harness::spawn(sensors);
        h.control.set_target(60.0).await.unwrap();

        let (state, store, messages) = h.finish_after(2).await;

        assert!(messages.is_empty());
        assert!(state.target().unwrap().active);
        assert!(store
            .temperature_samples()
            .iter()
            .all(|s| s.water_temp_f.is_none()));
    }

    // ── sampling ──

    #[tokio::test(start_paused = true)]
    async fn test_each_tick_persists_and_caches() {
        let sensors = ScriptedSensors::with_water_script(
            Some(71.0),
            &[Some(55.0), Some(54.5), Some(54.0)],
        );
        let h = Harness::spawn(sensors);

        let (state, store, messages) = h.finish_after(3).await;

        let samples = store.temperature_samples();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].water_temp_f, Some(54.0));
        assert_eq!(state.temperatures(), (Some(71.0), Some(54.0)));
        assert!(state.snapshot().last_sample_at.is_some());
        assert!(messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_failures_are_independent() {
        let sensors = ScriptedSensors::with_water_script(None, &[Some(48.0)]);
        let h = Harness::spawn(sensors);

        let (state, store, _) = h.finish_after(1).await;

        let sample = &store.temperature_samples()[0];
        assert!(sample.room_temp_f.is_none());
        assert_eq!(sample.water_temp_f, Some(48.0));
        assert_eq!(state.temperatures(), (None, Some(48.0)));
    }
}
