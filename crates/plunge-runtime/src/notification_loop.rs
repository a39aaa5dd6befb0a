//! Sequential delivery of notifications to the configured sink.

use plunge_core::gateways::NotificationSink;
use plunge_core::models::NotificationTask;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

pub(crate) const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

// ── NotificationQueue ─────────────────────────────────────────────────────────

/// Producer side of the notification channel, shared by the other loops.
#[derive(Debug, Clone)]
pub(crate) struct NotificationQueue {
    tx: mpsc::Sender<NotificationTask>,
}

impl NotificationQueue {
    pub(crate) fn new(tx: mpsc::Sender<NotificationTask>) -> Self {
        Self { tx }
    }

    /// Enqueue a message without waiting. A full queue drops the message so
    /// a stalled sink never holds up the producing loop. Loss after the
    /// delivery loop has exited is expected during shutdown.
    pub(crate) fn push(&self, message: impl Into<String>) {
        match self.tx.try_send(NotificationTask::new(message)) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) => {
                tracing::warn!(notification = %task.message, "notification queue full; dropping");
            }
            Err(TrySendError::Closed(task)) => {
                tracing::debug!(notification = %task.message, "notification dropped; delivery loop gone");
            }
        }
    }
}

// ── NotificationLoop ──────────────────────────────────────────────────────────

pub(crate) struct NotificationLoop<N> {
    pub sink: Option<N>,
    pub subject: String,
}

impl<N: NotificationSink> NotificationLoop<N> {
    /// Deliver queued tasks one at a time, in order, until cancelled.
    ///
    /// Cancellation is checked before each receive, so a message enqueued
    /// concurrently with shutdown may never be delivered.
    pub(crate) async fn run(
        self,
        mut rx: mpsc::Receiver<NotificationTask>,
        cancel: CancellationToken,
    ) {
        if self.sink.is_none() {
            tracing::warn!("no notification sink configured; notifications will be dropped");
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                task = rx.recv() => match task {
                    Some(task) => self.deliver(&task).await,
                    None => {
                        tracing::debug!("all notification producers gone");
                        break;
                    }
                },
            }
        }

        tracing::info!("notification loop stopped");
    }

    async fn deliver(&self, task: &NotificationTask) {
        let Some(sink) = &self.sink else {
            tracing::warn!(notification = %task.message, "dropping notification; no sink configured");
            return;
        };

        if let Err(e) = sink.send(&self.subject, &task.message).await {
            tracing::warn!(error = %e, notification = %task.message, "notification delivery failed");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
