//! Notification sinks.

use cla_core::error::ClaResult;
use cla_core::notification::{EmailMessage, NotificationSink};
use tracing::info;

/// Sink that records every message in the log instead of delivering it.
///
/// Used when no delivery collaborator is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    async fn send(&self, message: EmailMessage) -> ClaResult<()> {
        info!(
            from = %message.from,
            to = ?message.to,
            subject = %message.subject,
            template = message.notification.template(),
            "Notification dispatched"
        );
        Ok(())
    }
}
