//! Testing utilities and mock implementations.
//!
//! These types are provided for use in tests. They may appear unused in
//! the library itself but are consumed by unit and integration tests.

use crate::traits::{Clock, DispatchError, Notification, NotificationDispatcher};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    /// Create a clock stopped at `at`.
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    /// Jump to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *lock(&self.now) = at;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// What a [`RecordingDispatcher`] does with the next notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchBehavior {
    /// Accept every notification.
    #[default]
    Deliver,
    /// Reject every notification with a transport error.
    Fail,
    /// Never finish, so the caller's timeout fires.
    Hang,
}

/// A mock dispatcher that records every notification it is handed.
///
/// Attempts are recorded whatever the configured behavior.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
    behavior: Mutex<DispatchBehavior>,
}

impl RecordingDispatcher {
    /// Create a dispatcher that delivers everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher with the given behavior.
    #[must_use]
    pub fn with_behavior(behavior: DispatchBehavior) -> Self {
        Self { sent: Mutex::default(), behavior: Mutex::new(behavior) }
    }

    /// Change what happens to subsequent notifications.
    pub fn set_behavior(&self, behavior: DispatchBehavior) {
        *lock(&self.behavior) = behavior;
    }

    /// Every notification handed over so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }

    /// Number of notifications handed over so far.
    #[must_use]
    pub fn count(&self) -> usize {
        lock(&self.sent).len()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), DispatchError> {
        lock(&self.sent).push(notification.clone());
        let behavior = *lock(&self.behavior);
        match behavior {
            DispatchBehavior::Deliver => Ok(()),
            DispatchBehavior::Fail => Err(DispatchError::Transport("simulated failure".to_string())),
            DispatchBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn notification(id: i64) -> Notification {
        Notification {
            owner_id: 1,
            reminder_id: id,
            title: None,
            body: format!("body {id}"),
            metadata: serde_json::json!({ "reminder_id": id }),
        }
    }

    #[test]
    fn test_fake_clock_moves_only_when_told() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = FakeClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), start + Duration::minutes(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[tokio::test]
    async fn test_recording_dispatcher_records_attempts() {
        let dispatcher = RecordingDispatcher::new();
        assert!(dispatcher.dispatch(&notification(1)).await.is_ok());

        dispatcher.set_behavior(DispatchBehavior::Fail);
        assert!(matches!(
            dispatcher.dispatch(&notification(2)).await,
            Err(DispatchError::Transport(_))
        ));

        assert_eq!(dispatcher.count(), 2);
        assert_eq!(dispatcher.sent()[1].reminder_id, 2);
    }

    #[tokio::test]
    async fn test_hanging_dispatcher_never_finishes() {
        let dispatcher = RecordingDispatcher::with_behavior(DispatchBehavior::Hang);
        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            dispatcher.dispatch(&notification(3)),
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(dispatcher.count(), 1);
    }
}
