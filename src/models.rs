//! Record types for tasks, projects, reminders and reminder events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Error when a stored or user-supplied enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The value that failed to parse.
    pub value: String,
}

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started and not blocked.
    #[default]
    Pending,
    /// Being worked on.
    InProgress,
    /// Done.
    Completed,
    /// Waiting on at least one unfinished dependency.
    Blocked,
    /// Dropped.
    Cancelled,
}

impl TaskStatus {
    /// Parse a status from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, UnknownVariant> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(UnknownVariant { kind: "task status", value: s.to_string() }),
        }
    }

    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Project status. `OnHold` doubles as the blocked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Open for work.
    #[default]
    Active,
    /// Waiting on at least one unfinished dependency.
    OnHold,
    /// Done.
    Completed,
    /// Dropped.
    Cancelled,
}

impl ProjectStatus {
    /// Parse a status from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, UnknownVariant> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "on_hold" => Ok(Self::OnHold),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(UnknownVariant { kind: "project status", value: s.to_string() }),
        }
    }

    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::OnHold => "on_hold",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A task owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Row id.
    pub id: i64,
    /// Owning user.
    pub owner_id: i64,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Current status.
    pub status: TaskStatus,
    /// Project the task belongs to, if any.
    pub project_id: Option<i64>,
    /// Optional due instant.
    pub due_at: Option<DateTime<Utc>>,
    /// Set exactly while the status is `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last modification instant.
    pub updated_at: DateTime<Utc>,
}

/// A project owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Row id.
    pub id: i64,
    /// Owning user.
    pub owner_id: i64,
    /// Project name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Current status.
    pub status: ProjectStatus,
    /// Set exactly while the status is `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last modification instant.
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Project to attach the task to.
    pub project_id: Option<i64>,
    /// Optional due instant.
    pub due_at: Option<DateTime<Utc>>,
}

impl NewTask {
    /// A task with just a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }
}

/// Fields for creating a project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    /// Project name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

impl NewProject {
    /// A project with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }
}

/// How a reminder decides when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Fires once at `trigger_at`.
    #[default]
    OneTime,
    /// Fires at `trigger_at` and then per its recurrence rule.
    RecurringScheduled,
    /// Fires a fixed delay after a reference task completes.
    RecurringRelative,
}

impl ReminderKind {
    /// Parse a kind from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid kind.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, UnknownVariant> {
        match s.to_lowercase().as_str() {
            "one_time" => Ok(Self::OneTime),
            "recurring_scheduled" => Ok(Self::RecurringScheduled),
            "recurring_relative" => Ok(Self::RecurringRelative),
            _ => Err(UnknownVariant { kind: "reminder kind", value: s.to_string() }),
        }
    }

    /// Get the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::RecurringScheduled => "recurring_scheduled",
            Self::RecurringRelative => "recurring_relative",
        }
    }
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened to one occurrence of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderAction {
    /// The scheduler sent a notification.
    Triggered,
    /// The owner marked the occurrence done.
    Completed,
    /// The owner skipped the occurrence.
    Skipped,
}

impl ReminderAction {
    /// Parse an action from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid action.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, UnknownVariant> {
        match s.to_lowercase().as_str() {
            "triggered" => Ok(Self::Triggered),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(UnknownVariant { kind: "reminder action", value: s.to_string() }),
        }
    }

    /// Get the string representation of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ReminderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Row id.
    pub id: i64,
    /// Owning user.
    pub owner_id: i64,
    /// Optional short title.
    pub title: Option<String>,
    /// Body text shown in the notification.
    pub description: String,
    /// Scheduling kind.
    pub kind: ReminderKind,
    /// Next instant the reminder is due. `None` only for an unarmed relative reminder.
    pub trigger_at: Option<DateTime<Utc>>,
    /// RRULE-style rule, only for scheduled reminders.
    pub recurrence_rule: Option<String>,
    /// Persistent re-notification interval.
    pub remind_frequency_minutes: Option<i64>,
    /// Reference task for relative reminders.
    pub relative_to_task_id: Option<i64>,
    /// Delay after the reference task completes.
    pub relative_delay_minutes: Option<i64>,
    /// Last time the scheduler notified the owner.
    pub last_notified_at: Option<DateTime<Utc>>,
    /// False once resolved or exhausted.
    pub is_active: bool,
    /// Notifications are suppressed until this instant.
    pub snoozed_until: Option<DateTime<Utc>>,
    /// Linked task.
    pub task_id: Option<i64>,
    /// Linked file.
    pub file_reference_id: Option<i64>,
    /// Linked contact.
    pub contact_id: Option<i64>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last modification instant.
    pub updated_at: DateTime<Utc>,
}

/// Longest accepted re-notification interval or relative delay: 100 years.
pub const MAX_REMINDER_MINUTES: i64 = 100 * 366 * 24 * 60;

impl Reminder {
    /// The persistent re-notification interval as a duration.
    ///
    /// `None` when unset or too large to represent.
    #[must_use]
    pub fn remind_frequency(&self) -> Option<Duration> {
        self.remind_frequency_minutes.and_then(Duration::try_minutes)
    }

    /// The relative delay as a duration.
    ///
    /// `None` when unset or too large to represent.
    #[must_use]
    pub fn relative_delay(&self) -> Option<Duration> {
        self.relative_delay_minutes.and_then(Duration::try_minutes)
    }

    /// Whether the reminder is snoozed at `now`.
    #[must_use]
    pub fn is_snoozed_at(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }
}

/// One entry in a reminder's append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderEvent {
    /// Row id.
    pub id: i64,
    /// Parent reminder.
    pub reminder_id: i64,
    /// The instant this occurrence was due.
    pub expected_trigger_at: DateTime<Utc>,
    /// When the action happened.
    pub action_at: DateTime<Utc>,
    /// What happened.
    pub action: ReminderAction,
}

/// Fields for creating a reminder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReminder {
    /// Optional short title.
    #[serde(default)]
    pub title: Option<String>,
    /// Body text shown in the notification.
    #[serde(default)]
    pub description: String,
    /// Scheduling kind.
    #[serde(default)]
    pub kind: ReminderKind,
    /// First due instant (one-time and scheduled).
    #[serde(default)]
    pub trigger_at: Option<DateTime<Utc>>,
    /// RRULE-style rule (scheduled only).
    #[serde(default)]
    pub recurrence_rule: Option<String>,
    /// Persistent re-notification interval.
    #[serde(default)]
    pub remind_frequency_minutes: Option<i64>,
    /// Reference task (relative only).
    #[serde(default)]
    pub relative_to_task_id: Option<i64>,
    /// Delay after the reference task completes (relative only).
    #[serde(default)]
    pub relative_delay_minutes: Option<i64>,
    /// Linked task.
    #[serde(default)]
    pub task_id: Option<i64>,
    /// Linked file.
    #[serde(default)]
    pub file_reference_id: Option<i64>,
    /// Linked contact.
    #[serde(default)]
    pub contact_id: Option<i64>,
}

impl NewReminder {
    /// A reminder that fires once.
    #[must_use]
    pub fn one_time(description: impl Into<String>, trigger_at: DateTime<Utc>) -> Self {
        Self {
            description: description.into(),
            kind: ReminderKind::OneTime,
            trigger_at: Some(trigger_at),
            ..Self::default()
        }
    }

    /// A reminder that fires at `trigger_at` and then per `rule`.
    #[must_use]
    pub fn scheduled(
        description: impl Into<String>,
        trigger_at: DateTime<Utc>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            kind: ReminderKind::RecurringScheduled,
            trigger_at: Some(trigger_at),
            recurrence_rule: Some(rule.into()),
            ..Self::default()
        }
    }

    /// A reminder that fires `delay_minutes` after `task_id` completes.
    #[must_use]
    pub fn relative(description: impl Into<String>, task_id: i64, delay_minutes: i64) -> Self {
        Self {
            description: description.into(),
            kind: ReminderKind::RecurringRelative,
            relative_to_task_id: Some(task_id),
            relative_delay_minutes: Some(delay_minutes),
            ..Self::default()
        }
    }

    /// Re-notify every `minutes` until resolved.
    #[must_use]
    pub const fn with_frequency(mut self, minutes: i64) -> Self {
        self.remind_frequency_minutes = Some(minutes);
        self
    }

    /// Link the reminder to a task.
    #[must_use]
    pub const fn for_task(mut self, task_id: i64) -> Self {
        self.task_id = Some(task_id);
        self
    }
}

/// A partial update to a reminder. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::option_option)]
pub struct ReminderUpdate {
    /// New title.
    pub title: Option<Option<String>>,
    /// New description.
    pub description: Option<String>,
    /// New kind.
    pub kind: Option<ReminderKind>,
    /// New trigger instant.
    pub trigger_at: Option<Option<DateTime<Utc>>>,
    /// New recurrence rule.
    pub recurrence_rule: Option<Option<String>>,
    /// New persistent interval.
    pub remind_frequency_minutes: Option<Option<i64>>,
    /// New reference task.
    pub relative_to_task_id: Option<Option<i64>>,
    /// New relative delay.
    pub relative_delay_minutes: Option<Option<i64>>,
    /// New linked task.
    pub task_id: Option<Option<i64>>,
    /// New linked file.
    pub file_reference_id: Option<Option<i64>>,
    /// New linked contact.
    pub contact_id: Option<Option<i64>>,
    /// Re-activate or deactivate.
    pub is_active: Option<bool>,
}

impl ReminderUpdate {
    /// Check if any fields are set for update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.kind.is_none()
            && self.trigger_at.is_none()
            && self.recurrence_rule.is_none()
            && self.remind_frequency_minutes.is_none()
            && self.relative_to_task_id.is_none()
            && self.relative_delay_minutes.is_none()
            && self.task_id.is_none()
            && self.file_reference_id.is_none()
            && self.contact_id.is_none()
            && self.is_active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_task_status_roundtrip_strings() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Blocked,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(TaskStatus::from_str("done").is_err());
    }

    #[test]
    fn test_project_status_parse_is_case_insensitive() {
        assert_eq!(ProjectStatus::from_str("ON_HOLD").unwrap(), ProjectStatus::OnHold);
    }

    #[test]
    fn test_unknown_variant_display() {
        let err = ReminderKind::from_str("weekly").unwrap_err();
        assert_eq!(err.to_string(), "invalid reminder kind: 'weekly'");
    }

    #[test]
    fn test_reminder_kind_serde_uses_snake_case() {
        let json = serde_json::to_string(&ReminderKind::RecurringRelative).unwrap();
        assert_eq!(json, "\"recurring_relative\"");
    }

    #[test]
    fn test_new_reminder_builders() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let r = NewReminder::scheduled("Standup", at, "FREQ=DAILY").with_frequency(10).for_task(4);
        assert_eq!(r.kind, ReminderKind::RecurringScheduled);
        assert_eq!(r.trigger_at, Some(at));
        assert_eq!(r.remind_frequency_minutes, Some(10));
        assert_eq!(r.task_id, Some(4));

        let rel = NewReminder::relative("Water plants", 3, 60);
        assert_eq!(rel.trigger_at, None);
        assert_eq!(rel.relative_delay_minutes, Some(60));
    }

    #[test]
    fn test_oversized_minutes_have_no_duration() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let reminder = Reminder {
            id: 1,
            owner_id: 1,
            title: None,
            description: "Huge".to_string(),
            kind: ReminderKind::RecurringRelative,
            trigger_at: None,
            recurrence_rule: None,
            remind_frequency_minutes: Some(i64::MAX / 2),
            relative_to_task_id: Some(1),
            relative_delay_minutes: Some(i64::MAX),
            last_notified_at: None,
            is_active: true,
            snoozed_until: None,
            task_id: None,
            file_reference_id: None,
            contact_id: None,
            created_at: at,
            updated_at: at,
        };
        assert_eq!(reminder.remind_frequency(), None);
        assert_eq!(reminder.relative_delay(), None);

        let sane = Reminder { remind_frequency_minutes: Some(15), relative_delay_minutes: Some(60), ..reminder };
        assert_eq!(sane.remind_frequency(), Some(Duration::minutes(15)));
        assert_eq!(sane.relative_delay(), Some(Duration::minutes(60)));
    }

    #[test]
    fn test_reminder_update_is_empty() {
        assert!(ReminderUpdate::default().is_empty());
        let update = ReminderUpdate { is_active: Some(false), ..Default::default() };
        assert!(!update.is_empty());
    }
}
