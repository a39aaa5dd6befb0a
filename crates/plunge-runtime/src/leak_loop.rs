//! Leak sensor polling.
//!
//! Tracks one previous reading and turns edges into persisted
//! [`LeakRecord`](plunge_core::models::LeakRecord) intervals. While a leak is
//! present the pump is commanded off on every tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use plunge_core::gateways::{PersistenceGateway, SensorGateway};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::notification_loop::NotificationQueue;
use crate::state::SharedState;

pub(crate) struct LeakLoop<S, P> {
    pub sensors: Arc<S>,
    pub store: Arc<P>,
    pub state: SharedState,
    pub notifications: NotificationQueue,
    pub interval: Duration,
}

impl<S: SensorGateway, P: PersistenceGateway> LeakLoop<S, P> {
    pub(crate) async fn run(self, cancel: CancellationToken) {
        match self.store.get_latest_leak_record().await {
            Ok(record) => self.state.set_latest_leak(record),
            Err(e) => tracing::warn!(error = %e, "failed to load latest leak record"),
        }

        // A leak already present at startup counts as a fresh detection.
        let mut previous = false;
        let initial = match self.sensors.is_leak_present().await {
            Ok(present) => present,
            Err(e) => {
                tracing::warn!(error = %e, "initial leak read failed; assuming dry");
                false
            }
        };
        self.observe(&mut previous, initial).await;

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; the seed read above covers it.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => match self.sensors.is_leak_present().await {
                    Ok(present) => self.observe(&mut previous, present).await,
                    Err(e) => {
                        tracing::warn!(error = %e, "leak sensor read failed; keeping previous reading");
                    }
                },
            }
        }

        tracing::info!("leak loop stopped");
    }

    async fn observe(&self, previous: &mut bool, present: bool) {
        self.state.set_leak_present(present);

        if present {
            if let Err(e) = self.sensors.turn_pump_off().await {
                tracing::error!(error = %e, "failed to turn pump off during leak");
                self.notifications
                    .push(format!("Leak present and pump could not be turned off: {e}"));
            }
        }

        match (*previous, present) {
            (false, true) => self.leak_detected().await,
            (true, false) => self.leak_cleared().await,
            _ => {}
        }
        *previous = present;
    }

    async fn leak_detected(&self) {
        let detected_at = Utc::now();
        match self.store.create_leak_record(detected_at).await {
            Ok(record) => {
                tracing::warn!(record_id = record.id, "leak detected");
                self.state.set_latest_leak(Some(record));
            }
            Err(e) => tracing::error!(error = %e, "leak detected but record could not be saved"),
        }
        self.notifications.push("Leak detected! Pump turned off.");
    }

    async fn leak_cleared(&self) {
        let latest = match self.store.get_latest_leak_record().await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load leak record to clear");
                return;
            }
        };

        match latest {
            Some(record) if record.is_open() => match self.store.clear_leak_record(record.id).await {
                Ok(cleared) => {
                    tracing::info!(record_id = cleared.id, "leak cleared");
                    self.state.set_latest_leak(Some(cleared));
                    self.notifications.push("Leak cleared.");
                }
                Err(e) => tracing::warn!(error = %e, record_id = record.id, "failed to clear leak record"),
            },
            Some(record) => {
                tracing::warn!(record_id = record.id, "leak cleared but latest record is already closed");
            }
            None => tracing::warn!("leak cleared but no leak record exists"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
