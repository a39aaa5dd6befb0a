use plunge_core::gateways::NotificationSink;
use plunge_core::Result;

/// Notification sink that writes each message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    async fn send(&self, subject: &str, message: &str) -> Result<()> {
        tracing::info!(target: "coldplunge::notify", subject, "{message}");
        Ok(())
    }
}
