//! Real notification dispatcher implementations.

use crate::traits::{DispatchError, Notification, NotificationDispatcher};
use async_trait::async_trait;
use tracing::info;

/// Dispatcher that writes each notification to the log.
///
/// Used by the command-line runner when no push channel is configured.
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

impl LogDispatcher {
    /// Create a new log dispatcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), DispatchError> {
        info!(
            owner_id = notification.owner_id,
            reminder_id = notification.reminder_id,
            title = notification.title.as_deref().unwrap_or(""),
            body = %notification.body,
            "notification"
        );
        Ok(())
    }
}
