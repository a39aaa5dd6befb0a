//! Command channels into the ozone and temperature loops.
//!
//! Each request carries a one-shot acknowledgement that the owning loop fires
//! after applying it, so `send` behaves like a rendezvous: the caller resumes
//! only once its command has taken effect.

use plunge_core::{PlungeError, Result};
use tokio::sync::{mpsc, oneshot};

/// Single slot; producers wait on the acknowledgement, not on queue depth.
pub(crate) const COMMAND_CHANNEL_CAPACITY: usize = 1;

// ── Ozone ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OzoneCommand {
    Start { duration_minutes: u32 },
    Stop,
}

#[derive(Debug)]
pub(crate) struct OzoneRequest {
    pub command: OzoneCommand,
    pub applied: oneshot::Sender<()>,
}

/// Producer handle for ozone commands.
#[derive(Debug, Clone)]
pub struct OzoneControl {
    tx: mpsc::Sender<OzoneRequest>,
    max_minutes: u32,
}

impl OzoneControl {
    pub(crate) fn new(tx: mpsc::Sender<OzoneRequest>, max_minutes: u32) -> Self {
        Self { tx, max_minutes }
    }

    /// Start a run, replacing any run already in progress.
    pub async fn start(&self, duration_minutes: u32) -> Result<()> {
        self.send(OzoneCommand::Start { duration_minutes }).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(OzoneCommand::Stop).await
    }

    pub async fn send(&self, command: OzoneCommand) -> Result<()> {
        if let OzoneCommand::Start { duration_minutes } = command {
            if duration_minutes == 0 || duration_minutes > self.max_minutes {
                return Err(PlungeError::InvalidCommand(format!(
                    "ozone duration must be 1-{} minutes, got {duration_minutes}",
                    self.max_minutes
                )));
            }
        }

        let (applied, done) = oneshot::channel();
        self.tx
            .send(OzoneRequest { command, applied })
            .await
            .map_err(|_| PlungeError::MonitorStopped)?;
        done.await.map_err(|_| PlungeError::MonitorStopped)
    }
}

// ── Temperature target ────────────────────────────────────────────────────────

/// `None` disarms the current target.
#[derive(Debug)]
pub(crate) struct TargetRequest {
    pub target_temp_f: Option<f64>,
    pub applied: oneshot::Sender<()>,
}

/// Producer handle for water-temperature targets.
#[derive(Debug, Clone)]
pub struct TemperatureControl {
    tx: mpsc::Sender<TargetRequest>,
}

impl TemperatureControl {
    pub(crate) fn new(tx: mpsc::Sender<TargetRequest>) -> Self {
        Self { tx }
    }

    /// Arm a one-shot notification for when the water reaches `target_temp_f`.
    pub async fn set_target(&self, target_temp_f: f64) -> Result<()> {
        if !target_temp_f.is_finite() {
            return Err(PlungeError::InvalidCommand(format!(
                "target temperature must be a number, got {target_temp_f}"
            )));
        }

        self.send(Some(target_temp_f)).await
    }

    /// Disarm any target without notifying.
    pub async fn clear_target(&self) -> Result<()> {
        self.send(None).await
    }

    async fn send(&self, target_temp_f: Option<f64>) -> Result<()> {
        let (applied, done) = oneshot::channel();
        self.tx
            .send(TargetRequest {
                target_temp_f,
                applied,
            })
            .await
            .map_err(|_| PlungeError::MonitorStopped)?;
        done.await.map_err(|_| PlungeError::MonitorStopped)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_rejects_out_of_range_duration() {
        let (tx, mut rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let control = OzoneControl::new(tx, 60);

        assert!(matches!(
            control.start(0).await,
            Err(PlungeError::InvalidCommand(_))
        ));
        assert!(matches!(
            control.start(61).await,
            Err(PlungeError::InvalidCommand(_))
        ));
        assert!(rx.try_recv().is_err(), "rejected commands never reach the loop");
    }

    #[tokio::test]
    async fn test_send_waits_for_acknowledgement() {
        let (tx, mut rx) = mpsc::channel::<OzoneRequest>(COMMAND_CHANNEL_CAPACITY);
        let control = OzoneControl::new(tx, 60);

        let consumer = tokio::spawn(async move {
            let request = rx.recv().await.expect("request");
            assert_eq!(request.command, OzoneCommand::Start { duration_minutes: 15 });
            request.applied.send(()).expect("ack");
        });

        control.start(15).await.expect("acknowledged");
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_request_reports_stopped() {
        let (tx, mut rx) = mpsc::channel::<OzoneRequest>(COMMAND_CHANNEL_CAPACITY);
        let control = OzoneControl::new(tx, 60);

        let consumer = tokio::spawn(async move {
            // Receive and drop without acknowledging.
            drop(rx.recv().await);
        });

        assert!(matches!(control.stop().await, Err(PlungeError::MonitorStopped)));
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_channel_reports_stopped() {
        let (tx, rx) = mpsc::channel::<TargetRequest>(COMMAND_CHANNEL_CAPACITY);
        drop(rx);
        let control = TemperatureControl::new(tx);
        assert!(matches!(
            control.set_target(55.0).await,
            Err(PlungeError::MonitorStopped)
        ));
    }

    #[tokio::test]
    async fn test_set_target_rejects_nan() {
        let (tx, _rx) = mpsc::channel::<TargetRequest>(COMMAND_CHANNEL_CAPACITY);
        let control = TemperatureControl::new(tx);
        assert!(matches!(
            control.set_target(f64::NAN).await,
            Err(PlungeError::InvalidCommand(_))
        ));
    }
}
