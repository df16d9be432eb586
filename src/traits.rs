//! Core traits for testability and abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Source of the current instant.
///
/// Every "now" the engine uses comes from here so tests can pin and advance it.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A message ready to hand to a delivery channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// The user the notification is for.
    pub owner_id: i64,
    /// The reminder that produced it.
    pub reminder_id: i64,
    /// Optional headline.
    pub title: Option<String>,
    /// Rendered body text.
    pub body: String,
    /// Structured data for the client (always carries `reminder_id`).
    pub metadata: serde_json::Value,
}

/// Why a notification could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The delivery channel rejected or dropped the message.
    #[error("transport error: {0}")]
    Transport(String),

    /// Delivery did not finish within the configured bound.
    #[error("dispatch timed out after {0:?}")]
    Timeout(Duration),

    /// The owner has no device or address to deliver to.
    #[error("no recipient registered for owner {0}")]
    NoRecipient(i64),
}

/// Trait for delivering notifications to a user.
///
/// Implementations may be slow or fail; the scheduler bounds each call with a
/// timeout and never retries within the same pass.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be delivered.
    async fn dispatch(&self, notification: &Notification) -> Result<(), DispatchError>;
}
