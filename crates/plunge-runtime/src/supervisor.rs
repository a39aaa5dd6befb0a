//! Lifecycle owner for the four monitor loops.

use std::sync::Arc;

use plunge_core::gateways::{NotificationSink, PersistenceGateway, SensorGateway};
use plunge_core::settings::MonitorConfig;
use plunge_core::{PlungeError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::{
    OzoneControl, OzoneRequest, TargetRequest, TemperatureControl, COMMAND_CHANNEL_CAPACITY,
};
use crate::leak_loop::LeakLoop;
use crate::notification_loop::{NotificationLoop, NotificationQueue, NOTIFICATION_CHANNEL_CAPACITY};
use crate::ozone_loop::OzoneLoop;
use crate::state::{SharedState, StatusSnapshot};
use crate::temperature_loop::TemperatureLoop;

/// Command receivers held between construction and [`MonitorSupervisor::start`].
struct PendingReceivers {
    ozone: mpsc::Receiver<OzoneRequest>,
    targets: mpsc::Receiver<TargetRequest>,
}

// ── MonitorSupervisor ─────────────────────────────────────────────────────────

/// Owns the shared state and command channels, and runs the ozone, leak,
/// temperature and notification loops under one cancellation token.
///
/// Command handles are available from construction. Commands sent before
/// [`start`](Self::start) wait until the owning loop is running; commands
/// sent after [`cancel_and_wait`](Self::cancel_and_wait) fail with
/// [`PlungeError::MonitorStopped`].
pub struct MonitorSupervisor<S, P, N> {
    sensors: Arc<S>,
    store: Arc<P>,
    notifier: Option<N>,
    config: MonitorConfig,
    state: SharedState,
    cancel: CancellationToken,
    ozone: OzoneControl,
    temperature: TemperatureControl,
    pending: Option<PendingReceivers>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    exited: Vec<&'static str>,
}

impl<S, P, N> MonitorSupervisor<S, P, N>
where
    S: SensorGateway,
    P: PersistenceGateway,
    N: NotificationSink,
{
    pub fn new(sensors: Arc<S>, store: Arc<P>, notifier: Option<N>, config: MonitorConfig) -> Self {
        let (ozone_tx, ozone_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (target_tx, target_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        Self {
            sensors,
            store,
            notifier,
            ozone: OzoneControl::new(ozone_tx, config.max_ozone_minutes),
            temperature: TemperatureControl::new(target_tx),
            config,
            state: SharedState::new(),
            cancel: CancellationToken::new(),
            pending: Some(PendingReceivers {
                ozone: ozone_rx,
                targets: target_rx,
            }),
            handles: Vec::new(),
            exited: Vec::new(),
        }
    }

    /// Spawn the four loops. Fails with [`PlungeError::AlreadyStarted`] on
    /// any call after the first, including after shutdown.
    pub fn start(&mut self) -> Result<()> {
        let Some(PendingReceivers { ozone, targets }) = self.pending.take() else {
            return Err(PlungeError::AlreadyStarted);
        };

        let (note_tx, note_rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let notifications = NotificationQueue::new(note_tx);

        let ozone_loop = OzoneLoop {
            sensors: Arc::clone(&self.sensors),
            store: Arc::clone(&self.store),
            state: self.state.clone(),
            notifications: notifications.clone(),
        };
        let leak_loop = LeakLoop {
            sensors: Arc::clone(&self.sensors),
            store: Arc::clone(&self.store),
            state: self.state.clone(),
            notifications: notifications.clone(),
            interval: self.config.leak_interval,
        };
        let temperature_loop = TemperatureLoop {
            sensors: Arc::clone(&self.sensors),
            store: Arc::clone(&self.store),
            state: self.state.clone(),
            notifications,
            interval: self.config.temperature_interval,
            tolerance_f: self.config.target_tolerance_f,
        };
        let notification_loop = NotificationLoop {
            sink: self.notifier.take(),
            subject: self.config.notification_subject.clone(),
        };

        self.handles = vec![
            ("ozone", tokio::spawn(ozone_loop.run(ozone, self.cancel.clone()))),
            ("leak", tokio::spawn(leak_loop.run(self.cancel.clone()))),
            (
                "temperature",
                tokio::spawn(temperature_loop.run(targets, self.cancel.clone())),
            ),
            (
                "notification",
                tokio::spawn(notification_loop.run(note_rx, self.cancel.clone())),
            ),
        ];

        tracing::info!(
            temperature_interval_secs = self.config.temperature_interval.as_secs(),
            leak_interval_secs = self.config.leak_interval.as_secs(),
            "monitor started"
        );
        Ok(())
    }

    /// Cancel every loop and wait for all of them to exit, then clear the
    /// shared state. Loops blocked in a collaborator call finish that call
    /// first.
    pub async fn cancel_and_wait(&mut self) {
        self.cancel.cancel();
        // Never started: drop the receivers so pending commands fail.
        self.pending = None;

        for (name, handle) in self.handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!(monitor_loop = name, error = %e, "monitor loop ended abnormally");
            }
            tracing::debug!(monitor_loop = name, "monitor loop exited");
            self.exited.push(name);
        }

        self.state.reset();
        tracing::info!("monitor stopped");
    }
}

impl<S, P, N> MonitorSupervisor<S, P, N> {
    pub fn status(&self) -> StatusSnapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn ozone_control(&self) -> OzoneControl {
        self.ozone.clone()
    }

    pub fn temperature_control(&self) -> TemperatureControl {
        self.temperature.clone()
    }

    pub fn sensors(&self) -> &Arc<S> {
        &self.sensors
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Names of loops spawned and not yet finished.
    pub fn running_loops(&self) -> Vec<&'static str> {
        self.handles
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Names of loops awaited by [`cancel_and_wait`](MonitorSupervisor::cancel_and_wait).
    pub fn exited_loops(&self) -> &[&'static str] {
        &self.exited
    }
}

impl<S, P, N> Drop for MonitorSupervisor<S, P, N> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            tracing::warn!("monitor dropped without cancel_and_wait; loops cancelled but not awaited");
        }
        self.cancel.cancel();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
