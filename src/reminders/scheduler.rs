//! Due-reminder scheduler.
//!
//! Each run selects the reminders that need a notification, dispatches them
//! one by one under a timeout, and then commits the bookkeeping for the whole
//! batch in a single transaction. Delivery is at most once per run; a failed
//! dispatch is recorded like a successful one and not retried.

use super::lifecycle::{fetch_reminder, parse_reminder, record_event, REMINDER_COLUMNS};
use super::render::MessageRenderer;
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::models::{Reminder, ReminderAction};
use crate::store::{format_instant, SqliteStore};
use crate::traits::{DispatchError, NotificationDispatcher};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Why a reminder was selected for notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyReason {
    /// The current occurrence has not been notified yet.
    FirstTrigger,
    /// Still unresolved and the re-notification interval has elapsed.
    Persistent,
}

impl NotifyReason {
    /// Get the string representation of the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstTrigger => "first_trigger",
            Self::Persistent => "persistent",
        }
    }
}

/// Timing and batching for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Pause between runs.
    pub interval: Duration,
    /// Most reminders dispatched in one run; the rest wait for the next run.
    pub max_batch: usize,
    /// Bound on a single dispatch.
    pub dispatch_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            max_batch: config.max_batch,
            dispatch_timeout: Duration::from_secs(config.dispatch_timeout_secs),
        }
    }
}

/// Outcome of one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Reminders that qualified for notification.
    pub selected: usize,
    /// Qualified reminders left for a later run by the batch cap.
    pub deferred: usize,
    /// Dispatches that succeeded.
    pub delivered: usize,
    /// Dispatches that failed or timed out.
    pub failed: usize,
    /// Reminders changed by someone else while their notification was in flight.
    pub superseded: usize,
}

/// Decide whether a reminder needs a notification at `now`.
#[must_use]
pub fn notify_reason(reminder: &Reminder, now: DateTime<Utc>) -> Option<NotifyReason> {
    let trigger_at = reminder.trigger_at?;
    if !reminder.is_active || trigger_at > now || reminder.is_snoozed_at(now) {
        return None;
    }
    match reminder.last_notified_at {
        None => Some(NotifyReason::FirstTrigger),
        Some(last) if last < trigger_at => Some(NotifyReason::FirstTrigger),
        Some(last) => {
            let next = reminder.remind_frequency().and_then(|every| last.checked_add_signed(every))?;
            (next <= now).then_some(NotifyReason::Persistent)
        }
    }
}

/// Keep the reminders that need a notification at `now`, in input order.
///
/// A reminder appears at most once even if it is both newly due and overdue
/// for a persistent re-notification.
#[must_use]
pub fn select_due(candidates: Vec<Reminder>, now: DateTime<Utc>) -> Vec<(Reminder, NotifyReason)> {
    candidates
        .into_iter()
        .filter_map(|reminder| notify_reason(&reminder, now).map(|reason| (reminder, reason)))
        .collect()
}

/// Active, due, unsnoozed reminders that may need a notification, oldest trigger first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn due_candidates(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
    let sql = format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders
         WHERE is_active = 1
           AND trigger_at IS NOT NULL AND trigger_at <= ?1
           AND (snoozed_until IS NULL OR snoozed_until <= ?1)
           AND (last_notified_at IS NULL
                OR last_notified_at < trigger_at
                OR remind_frequency_minutes IS NOT NULL)
         ORDER BY trigger_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let reminders = stmt
        .query_map(params![format_instant(now)], parse_reminder)?
        .collect::<rusqlite::Result<_>>()?;
    Ok(reminders)
}

/// Record that `reminder` was notified at `now`.
///
/// The event is appended whenever the reminder still exists. The notification
/// mark is only set if the reminder is unchanged since it was selected, so an
/// occurrence minted meanwhile is still notified. Returns whether the mark was set.
fn record_trigger(conn: &Connection, reminder: &Reminder, now: DateTime<Utc>) -> Result<bool> {
    if fetch_reminder(conn, reminder.id)?.is_none() {
        return Ok(false);
    }
    let expected = reminder.trigger_at.unwrap_or(now);
    record_event(conn, reminder.id, expected, ReminderAction::Triggered, now)?;

    let rows = conn.execute(
        "UPDATE reminders SET last_notified_at = ?2
         WHERE id = ?1 AND is_active = 1 AND trigger_at IS ?3 AND last_notified_at IS ?4",
        params![
            reminder.id,
            format_instant(now),
            reminder.trigger_at.map(format_instant),
            reminder.last_notified_at.map(format_instant),
        ],
    )?;
    Ok(rows == 1)
}

/// Periodically notifies owners about due reminders.
pub struct DueReminderScheduler {
    store: SqliteStore,
    dispatcher: Arc<dyn NotificationDispatcher>,
    renderer: MessageRenderer,
    settings: SchedulerSettings,
}

impl std::fmt::Debug for DueReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DueReminderScheduler")
            .field("store", &self.store)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl DueReminderScheduler {
    /// Create a scheduler over `store` that delivers through `dispatcher`.
    #[must_use]
    pub fn new(
        store: SqliteStore,
        dispatcher: Arc<dyn NotificationDispatcher>,
        settings: SchedulerSettings,
    ) -> Self {
        Self { store, dispatcher, renderer: MessageRenderer::standard(), settings }
    }

    /// Use a custom message renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: MessageRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// The settings this scheduler runs with.
    #[must_use]
    pub const fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Reminders that would be notified if a run started now.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn due_reminders(&self) -> Result<Vec<(Reminder, NotifyReason)>> {
        let now = self.store.now();
        let conn = self.store.open()?;
        Ok(select_due(due_candidates(&conn, now)?, now))
    }

    /// Run one pass: select, dispatch, then commit the bookkeeping atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the commit fails. In the
    /// latter case nothing is recorded and the same reminders are selected again
    /// next run.
    pub async fn run_once(&self) -> Result<RunReport> {
        let now = self.store.now();
        let mut selected = {
            let conn = self.store.open()?;
            select_due(due_candidates(&conn, now)?, now)
        };

        let mut report = RunReport { selected: selected.len(), ..RunReport::default() };
        if selected.len() > self.settings.max_batch {
            report.deferred = selected.len() - self.settings.max_batch;
            selected.truncate(self.settings.max_batch);
            info!(deferred = report.deferred, "batch cap reached; the rest wait for the next run");
        }
        if selected.is_empty() {
            return Ok(report);
        }

        for (reminder, reason) in &selected {
            let notification = self.renderer.render(reminder, *reason);
            let outcome =
                tokio::time::timeout(self.settings.dispatch_timeout, self.dispatcher.dispatch(&notification))
                    .await
                    .unwrap_or(Err(DispatchError::Timeout(self.settings.dispatch_timeout)));
            match outcome {
                Ok(()) => {
                    report.delivered += 1;
                    debug!(reminder_id = reminder.id, reason = reason.as_str(), "notification dispatched");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(reminder_id = reminder.id, error = %e, "notification dispatch failed");
                }
            }
        }

        let marked = self
            .store
            .write(|tx| {
                let mut marked = 0;
                for (reminder, _) in &selected {
                    if record_trigger(tx, reminder, now)? {
                        marked += 1;
                    }
                }
                Ok(marked)
            })
            .map_err(|e| {
                error!(error = %e, "failed to commit notification bookkeeping");
                e
            })?;
        report.superseded = selected.len() - marked;

        info!(
            selected = report.selected,
            delivered = report.delivered,
            failed = report.failed,
            superseded = report.superseded,
            "scheduler run complete"
        );
        Ok(report)
    }

    /// Run forever on the configured interval until `shutdown` is notified.
    ///
    /// A failed run is logged and the loop carries on.
    pub fn spawn(self, shutdown: Arc<Notify>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.settings.interval.as_secs(), "reminder scheduler started");
            loop {
                if let Err(e) = self.run_once().await {
                    error!(error = %e, "scheduler run failed");
                }
                tokio::select! {
                    () = tokio::time::sleep(self.settings.interval) => {}
                    () = shutdown.notified() => {
                        info!("reminder scheduler stopped");
                        break;
                    }
                }
            }
        })
    }
}
