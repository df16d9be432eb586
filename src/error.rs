//! Error types for `cadence`.

use crate::models::ReminderKind;

/// Reasons a reminder (or a patch to one) is rejected before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A one-time or scheduled reminder has no trigger instant.
    #[error("trigger_at is required for {0} reminders")]
    MissingTriggerAt(ReminderKind),

    /// A relative reminder was given a trigger instant up front.
    #[error("trigger_at must be empty for recurring_relative reminders until the task completes")]
    UnexpectedTriggerAt,

    /// A timestamp was supplied without a UTC offset.
    #[error("timestamp '{0}' has no time zone offset")]
    AmbiguousInstant(String),

    /// A timestamp falls outside years 0000 to 9999.
    #[error("timestamp '{0}' is outside the supported range (years 0000-9999)")]
    InstantOutOfRange(String),

    /// A timestamp could not be parsed at all.
    #[error("'{0}' is not an RFC 3339 timestamp")]
    InvalidInstant(String),

    /// A scheduled reminder has no recurrence rule.
    #[error("recurrence_rule is required for recurring_scheduled reminders")]
    MissingRecurrenceRule,

    /// A recurrence rule was given for a kind that does not use one.
    #[error("recurrence_rule is not allowed for {0} reminders")]
    UnexpectedRecurrenceRule(ReminderKind),

    /// The recurrence rule could not be parsed.
    #[error("invalid recurrence rule: {0}")]
    InvalidRecurrenceRule(String),

    /// A relative reminder has no reference task.
    #[error("relative_to_task_id is required for recurring_relative reminders")]
    MissingRelativeTask,

    /// A relative reminder has no delay.
    #[error("relative_delay_minutes is required for recurring_relative reminders")]
    MissingRelativeDelay,

    /// Relative fields were given for a kind that does not use them.
    #[error("relative_to_task_id and relative_delay_minutes are only allowed for recurring_relative reminders, not {0}")]
    UnexpectedRelativeFields(ReminderKind),

    /// The relative delay is negative.
    #[error("relative_delay_minutes must not be negative (got {0})")]
    NegativeDelay(i64),

    /// The relative delay is longer than any reminder can wait.
    #[error("relative_delay_minutes must be at most {max} (got {got})")]
    DelayTooLong {
        /// The rejected delay.
        got: i64,
        /// The largest accepted delay.
        max: i64,
    },

    /// The persistent re-notification interval is zero or negative.
    #[error("remind_frequency_minutes must be positive (got {0})")]
    NonPositiveFrequency(i64),

    /// The persistent re-notification interval is longer than any reminder can wait.
    #[error("remind_frequency_minutes must be at most {max} (got {got})")]
    FrequencyTooLong {
        /// The rejected interval.
        got: i64,
        /// The largest accepted interval.
        max: i64,
    },
}

/// Errors that can occur in the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SQLite` database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A template error occurred.
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    /// The configuration file holds values the engine cannot run with.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The request was rejected before touching the store.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A recurrence lookup gave up before finding the next occurrence.
    #[error("{0}")]
    Recurrence(#[from] crate::recurrence::SearchLimitReached),

    /// The record does not exist or belongs to another owner.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// The id that was looked up.
        id: i64,
    },

    /// A node was asked to depend on itself.
    #[error("{entity} {id} cannot depend on itself")]
    SelfDependency {
        /// Kind of node.
        entity: &'static str,
        /// The node id.
        id: i64,
    },

    /// The requested edge would close a dependency cycle.
    #[error("adding dependency {node} -> {depends_on} would create a cycle")]
    CircularDependency {
        /// The node that would gain the dependency.
        node: i64,
        /// The node it would depend on.
        depends_on: i64,
    },

    /// The reminder was already completed, skipped or exhausted.
    #[error("reminder {id} is already resolved")]
    AlreadyResolved {
        /// The reminder id.
        id: i64,
    },
}

impl Error {
    /// Build a collapsed not-found/unauthorized error.
    #[must_use]
    pub const fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Whether this error is the collapsed not-found/unauthorized kind.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_does_not_mention_owner() {
        let err = Error::not_found("task", 7);
        assert_eq!(err.to_string(), "task 7 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_validation_error_converts() {
        let err: Error = ValidationError::MissingRecurrenceRule.into();
        assert!(matches!(err, Error::Validation(ValidationError::MissingRecurrenceRule)));
        assert!(err.to_string().contains("recurrence_rule is required"));
    }

    #[test]
    fn test_kind_appears_in_message() {
        let err = ValidationError::MissingTriggerAt(ReminderKind::OneTime);
        assert_eq!(err.to_string(), "trigger_at is required for one_time reminders");
    }
}
