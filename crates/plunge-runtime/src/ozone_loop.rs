//! Ozone generator run control.
//!
//! The loop owns the generator: it alone turns it on and off, persists run
//! entries, and publishes [`OzoneRunState`] into shared state. A run's
//! deadline is an absolute [`Instant`] watched from the same `select!` that
//! receives commands, so expiry and manual stops are serialized.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use plunge_core::gateways::{PersistenceGateway, SensorGateway};
use plunge_core::models::OzoneRunState;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::commands::{OzoneCommand, OzoneRequest};
use crate::notification_loop::NotificationQueue;
use crate::state::SharedState;

const RUNNING_STATUS: &str = "Running";

// ── Run bookkeeping ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct ActiveRun {
    /// `None` when the entry could not be persisted.
    entry_id: Option<i64>,
    started_at: DateTime<Utc>,
    duration_minutes: u32,
    deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Manual,
    Expired,
    Replaced,
    Shutdown,
}

impl StopReason {
    fn status(self) -> &'static str {
        match self {
            Self::Manual => "Stopped manually",
            Self::Expired => "Completed",
            Self::Replaced => "Replaced by new run",
            Self::Shutdown => "Stopped at shutdown",
        }
    }
}

/// Resolves at `deadline`, or never when there is no run.
async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ── OzoneLoop ─────────────────────────────────────────────────────────────────

pub(crate) struct OzoneLoop<S, P> {
    pub sensors: Arc<S>,
    pub store: Arc<P>,
    pub state: SharedState,
    pub notifications: NotificationQueue,
}

impl<S: SensorGateway, P: PersistenceGateway> OzoneLoop<S, P> {
    pub(crate) async fn run(
        self,
        mut commands: mpsc::Receiver<OzoneRequest>,
        cancel: CancellationToken,
    ) {
        self.restore().await;

        let mut active: Option<ActiveRun> = None;
        let mut commands_open = true;

        loop {
            let deadline = active.as_ref().map(|run| run.deadline);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = deadline_reached(deadline) => {
                    if let Some(run) = active.take() {
                        let stopped = self.retire(run, StopReason::Expired).await;
                        self.state.set_ozone(stopped);
                    }
                }
                request = commands.recv(), if commands_open => match request {
                    Some(OzoneRequest { command, applied }) => {
                        active = self.apply(command, active.take()).await;
                        // Requester may have given up waiting.
                        let _ = applied.send(());
                    }
                    None => {
                        tracing::debug!("ozone command channel closed");
                        commands_open = false;
                    }
                },
            }
        }

        if let Some(run) = active.take() {
            let stopped = self.retire(run, StopReason::Shutdown).await;
            self.state.set_ozone(stopped);
        }

        tracing::info!("ozone loop stopped");
    }

    /// Load the latest persisted run for display and force the generator to
    /// a known-off baseline.
    async fn restore(&self) {
        match self.store.get_latest_ozone_entry().await {
            Ok(Some(entry)) => {
                if entry.running {
                    tracing::warn!(
                        entry_id = entry.id,
                        "latest ozone entry is still marked running; treating it as stopped"
                    );
                }
                self.state.set_ozone(OzoneRunState::from_persisted(&entry));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to load latest ozone entry"),
        }

        if let Err(e) = self.sensors.turn_ozone_off().await {
            tracing::error!(error = %e, "failed to turn ozone generator off at startup");
            self.notifications.push(format!("Ozone generator may still be on: {e}"));
        }
    }

    async fn apply(&self, command: OzoneCommand, active: Option<ActiveRun>) -> Option<ActiveRun> {
        match (command, active) {
            (OzoneCommand::Stop, None) => {
                tracing::debug!("stop ignored; no ozone run in progress");
                None
            }
            (OzoneCommand::Stop, Some(run)) => {
                let stopped = self.retire(run, StopReason::Manual).await;
                self.state.set_ozone(stopped);
                None
            }
            (OzoneCommand::Start { duration_minutes }, previous) => {
                // Shared state keeps showing the old run until the new one
                // replaces it below.
                if let Some(run) = previous {
                    self.retire(run, StopReason::Replaced).await;
                }
                let (run, started) = self.begin(duration_minutes).await;
                self.state.set_ozone(started);
                Some(run)
            }
        }
    }

    async fn begin(&self, duration_minutes: u32) -> (ActiveRun, OzoneRunState) {
        let started_at = Utc::now();
        let entry_id = match self.store.start_ozone_entry(started_at, duration_minutes).await {
            Ok(entry) => Some(entry.id),
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist ozone entry");
                None
            }
        };

        let mut status = RUNNING_STATUS.to_string();
        if let Err(e) = self.sensors.turn_ozone_on().await {
            tracing::error!(error = %e, "failed to turn ozone generator on");
            status = format!("Ozone on failed: {e}");
            if let Some(id) = entry_id {
                if let Err(e) = self.store.update_ozone_entry_status(id, &status).await {
                    tracing::warn!(error = %e, entry_id = id, "failed to record ozone status");
                }
            }
            self.notifications.push(format!("Failed to turn ozone on: {e}"));
        }

        tracing::info!(?entry_id, duration_minutes, "ozone run started");
        self.notifications.push(format!("Ozone started for {duration_minutes} minutes"));

        let run = ActiveRun {
            entry_id,
            started_at,
            duration_minutes,
            deadline: Instant::now() + Duration::from_secs(u64::from(duration_minutes) * 60),
        };
        (run, OzoneRunState::started(started_at, duration_minutes, &status))
    }

    /// Turn the generator off and close out `run`. Always yields a stopped
    /// state, whatever the hardware or store report.
    async fn retire(&self, run: ActiveRun, reason: StopReason) -> OzoneRunState {
        if let Err(e) = self.sensors.turn_ozone_off().await {
            tracing::error!(error = %e, "failed to turn ozone generator off");
            self.notifications.push(format!("Ozone generator may still be on: {e}"));
        }

        let status = reason.status();
        let mut end_time = Utc::now();

        if let Some(id) = run.entry_id {
            match self.store.stop_ozone_entry(id).await {
                Ok(entry) => end_time = entry.end_time.unwrap_or(end_time),
                Err(e) => tracing::warn!(error = %e, entry_id = id, "failed to stop ozone entry"),
            }
            if let Err(e) = self.store.update_ozone_entry_status(id, status).await {
                tracing::warn!(error = %e, entry_id = id, "failed to record ozone status");
            }
        }

        tracing::info!(entry_id = ?run.entry_id, status, "ozone run stopped");
        self.notifications.push(format!("Ozone stopped: {status}"));

        OzoneRunState {
            running: false,
            start_time: Some(run.started_at),
            end_time: Some(end_time),
            expected_duration_minutes: run.duration_minutes,
            status_message: status.to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
