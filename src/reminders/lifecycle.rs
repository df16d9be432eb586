//! Reminder lifecycle: creation, resolution and relative rescheduling.

use crate::error::{Error, Result, ValidationError};
use crate::models::{
    NewReminder, Reminder, ReminderAction, ReminderEvent, ReminderKind, ReminderUpdate, MAX_REMINDER_MINUTES,
};
use crate::recurrence::RecurrenceRule;
use crate::store::{enum_at, format_instant, instant_at, is_storable, opt_instant_at, SqliteStore};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

pub(crate) const REMINDER_COLUMNS: &str = "id, owner_id, title, description, kind, trigger_at, \
     recurrence_rule, remind_frequency_minutes, relative_to_task_id, relative_delay_minutes, \
     last_notified_at, is_active, snoozed_until, task_id, file_reference_id, contact_id, \
     created_at, updated_at";

const EVENT_COLUMNS: &str = "id, reminder_id, expected_trigger_at, action_at, action";

/// Parse a reminder from a row selected with `REMINDER_COLUMNS`.
pub(crate) fn parse_reminder(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        kind: enum_at(row, 4, ReminderKind::from_str)?,
        trigger_at: opt_instant_at(row, 5)?,
        recurrence_rule: row.get(6)?,
        remind_frequency_minutes: row.get(7)?,
        relative_to_task_id: row.get(8)?,
        relative_delay_minutes: row.get(9)?,
        last_notified_at: opt_instant_at(row, 10)?,
        is_active: row.get(11)?,
        snoozed_until: opt_instant_at(row, 12)?,
        task_id: row.get(13)?,
        file_reference_id: row.get(14)?,
        contact_id: row.get(15)?,
        created_at: instant_at(row, 16)?,
        updated_at: instant_at(row, 17)?,
    })
}

fn parse_event(row: &Row<'_>) -> rusqlite::Result<ReminderEvent> {
    Ok(ReminderEvent {
        id: row.get(0)?,
        reminder_id: row.get(1)?,
        expected_trigger_at: instant_at(row, 2)?,
        action_at: instant_at(row, 3)?,
        action: enum_at(row, 4, ReminderAction::from_str)?,
    })
}

/// Parse a user-supplied timestamp, which must carry a UTC offset.
///
/// # Errors
///
/// Returns `AmbiguousInstant` for a timestamp without offset,
/// `InstantOutOfRange` when the UTC year has more than four digits and
/// `InvalidInstant` for anything else that is not RFC 3339.
pub fn parse_instant(text: &str) -> std::result::Result<DateTime<Utc>, ValidationError> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        let instant = instant.with_timezone(&Utc);
        return if is_storable(instant) {
            Ok(instant)
        } else {
            Err(ValidationError::InstantOutOfRange(text.to_string()))
        };
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(text, format).is_ok());
    if naive {
        Err(ValidationError::AmbiguousInstant(text.to_string()))
    } else {
        Err(ValidationError::InvalidInstant(text.to_string()))
    }
}

/// Check a reminder's fields for internal consistency.
///
/// # Errors
///
/// Returns the first rule the fields violate.
pub fn validate_reminder(spec: &NewReminder) -> std::result::Result<(), ValidationError> {
    check_fields(spec, false)
}

/// `armed_relative` allows a relative reminder that already has a trigger,
/// which only happens after its task completed.
fn check_fields(spec: &NewReminder, armed_relative: bool) -> std::result::Result<(), ValidationError> {
    if let Some(minutes) = spec.remind_frequency_minutes {
        if minutes <= 0 {
            return Err(ValidationError::NonPositiveFrequency(minutes));
        }
        if minutes > MAX_REMINDER_MINUTES {
            return Err(ValidationError::FrequencyTooLong { got: minutes, max: MAX_REMINDER_MINUTES });
        }
    }
    if let Some(at) = spec.trigger_at.filter(|at| !is_storable(*at)) {
        return Err(ValidationError::InstantOutOfRange(at.to_rfc3339()));
    }
    let has_relative_fields =
        spec.relative_to_task_id.is_some() || spec.relative_delay_minutes.is_some();

    match spec.kind {
        ReminderKind::OneTime => {
            if spec.trigger_at.is_none() {
                return Err(ValidationError::MissingTriggerAt(spec.kind));
            }
            if spec.recurrence_rule.is_some() {
                return Err(ValidationError::UnexpectedRecurrenceRule(spec.kind));
            }
            if has_relative_fields {
                return Err(ValidationError::UnexpectedRelativeFields(spec.kind));
            }
        }
        ReminderKind::RecurringScheduled => {
            if spec.trigger_at.is_none() {
                return Err(ValidationError::MissingTriggerAt(spec.kind));
            }
            let rule = spec.recurrence_rule.as_deref().ok_or(ValidationError::MissingRecurrenceRule)?;
            RecurrenceRule::parse(rule)
                .map_err(|e| ValidationError::InvalidRecurrenceRule(e.to_string()))?;
            if has_relative_fields {
                return Err(ValidationError::UnexpectedRelativeFields(spec.kind));
            }
        }
        ReminderKind::RecurringRelative => {
            if spec.relative_to_task_id.is_none() {
                return Err(ValidationError::MissingRelativeTask);
            }
            let delay = spec.relative_delay_minutes.ok_or(ValidationError::MissingRelativeDelay)?;
            if delay < 0 {
                return Err(ValidationError::NegativeDelay(delay));
            }
            if delay > MAX_REMINDER_MINUTES {
                return Err(ValidationError::DelayTooLong { got: delay, max: MAX_REMINDER_MINUTES });
            }
            if spec.recurrence_rule.is_some() {
                return Err(ValidationError::UnexpectedRecurrenceRule(spec.kind));
            }
            if spec.trigger_at.is_some() && !armed_relative {
                return Err(ValidationError::UnexpectedTriggerAt);
            }
        }
    }
    Ok(())
}

/// Check that every record the reminder links to belongs to the owner.
fn check_references(conn: &Connection, owner_id: i64, spec: &NewReminder) -> Result<()> {
    let links = [
        ("tasks", "task", spec.task_id),
        ("tasks", "task", spec.relative_to_task_id),
        ("file_references", "file_reference", spec.file_reference_id),
        ("contacts", "contact", spec.contact_id),
    ];
    for (table, entity, id) in links {
        if let Some(id) = id {
            if !SqliteStore::owns(conn, table, owner_id, id)? {
                return Err(Error::not_found(entity, id));
            }
        }
    }
    Ok(())
}

/// Load a reminder by id regardless of owner.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fetch_reminder(conn: &Connection, id: i64) -> Result<Option<Reminder>> {
    let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], parse_reminder).optional()?)
}

/// Load a reminder that must belong to `owner_id`.
///
/// # Errors
///
/// Returns `NotFound` if the reminder does not exist or is not the owner's.
pub fn fetch_owned_reminder(conn: &Connection, owner_id: i64, id: i64) -> Result<Reminder> {
    match fetch_reminder(conn, id)? {
        Some(reminder) if reminder.owner_id == owner_id => Ok(reminder),
        _ => Err(Error::not_found("reminder", id)),
    }
}

fn insert_reminder(conn: &Connection, owner_id: i64, spec: &NewReminder, now: DateTime<Utc>) -> Result<Reminder> {
    conn.execute(
        "INSERT INTO reminders (
            owner_id, title, description, kind, trigger_at, recurrence_rule,
            remind_frequency_minutes, relative_to_task_id, relative_delay_minutes,
            task_id, file_reference_id, contact_id, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            owner_id,
            spec.title,
            spec.description,
            spec.kind.as_str(),
            spec.trigger_at.map(format_instant),
            spec.recurrence_rule,
            spec.remind_frequency_minutes,
            spec.relative_to_task_id,
            spec.relative_delay_minutes,
            spec.task_id,
            spec.file_reference_id,
            spec.contact_id,
            format_instant(now),
        ],
    )?;
    fetch_owned_reminder(conn, owner_id, conn.last_insert_rowid())
}

/// Append one entry to a reminder's history.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn record_event(
    conn: &Connection,
    reminder_id: i64,
    expected_trigger_at: DateTime<Utc>,
    action: ReminderAction,
    action_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO reminder_events (reminder_id, expected_trigger_at, action_at, action)
         VALUES (?1, ?2, ?3, ?4)",
        params![reminder_id, format_instant(expected_trigger_at), format_instant(action_at), action.as_str()],
    )?;
    Ok(())
}

/// Resolve the current occurrence of a reminder as completed or skipped.
///
/// A scheduled reminder moves on to its next occurrence after the current
/// trigger, or is deactivated when the series is exhausted. Every other kind
/// is deactivated.
///
/// # Errors
///
/// * `NotFound` if the reminder is missing or not the owner's.
/// * `AlreadyResolved` if it is no longer active.
pub fn resolve(
    conn: &Connection,
    owner_id: i64,
    id: i64,
    action: ReminderAction,
    now: DateTime<Utc>,
) -> Result<Reminder> {
    let reminder = fetch_owned_reminder(conn, owner_id, id)?;
    if !reminder.is_active {
        return Err(Error::AlreadyResolved { id });
    }

    // An unarmed relative reminder has no trigger; record the action instant instead.
    let expected = reminder.trigger_at.unwrap_or(now);
    record_event(conn, id, expected, action, now)?;

    let next = match (reminder.kind, reminder.recurrence_rule.as_deref()) {
        (ReminderKind::RecurringScheduled, Some(rule)) => match RecurrenceRule::parse(rule) {
            // A lookup that gives up fails the action instead of ending a live series.
            Ok(parsed) => parsed.next_after(expected)?,
            Err(e) => {
                warn!(reminder_id = id, error = %e, "stored recurrence rule no longer parses");
                None
            }
        },
        _ => None,
    };

    if let Some(next) = next {
        conn.execute(
            "UPDATE reminders SET trigger_at = ?2, snoozed_until = NULL, updated_at = ?3 WHERE id = ?1",
            params![id, format_instant(next), format_instant(now)],
        )?;
        debug!(reminder_id = id, %action, next = %next, "reminder advanced");
    } else {
        conn.execute(
            "UPDATE reminders SET is_active = 0, updated_at = ?2 WHERE id = ?1",
            params![id, format_instant(now)],
        )?;
        debug!(reminder_id = id, %action, "reminder resolved");
    }

    fetch_owned_reminder(conn, owner_id, id)
}

/// Arm every active relative reminder anchored on `task_id`.
///
/// Each gets `trigger_at = completed_at + delay` and a cleared notification
/// mark, so the scheduler treats it as a fresh occurrence.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn on_task_completed(
    conn: &Connection,
    task_id: i64,
    completed_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<Reminder>> {
    let sql = format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders
         WHERE relative_to_task_id = ?1 AND kind = 'recurring_relative' AND is_active = 1
         ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let anchored: Vec<Reminder> =
        stmt.query_map(params![task_id], parse_reminder)?.collect::<rusqlite::Result<_>>()?;

    let mut rescheduled = Vec::with_capacity(anchored.len());
    for reminder in anchored {
        let Some(trigger_at) = reminder
            .relative_delay()
            .and_then(|d| completed_at.checked_add_signed(d))
            .filter(|at| is_storable(*at))
        else {
            warn!(reminder_id = reminder.id, "relative delay out of range; reminder left unarmed");
            continue;
        };
        conn.execute(
            "UPDATE reminders
             SET trigger_at = ?2, last_notified_at = NULL, snoozed_until = NULL, updated_at = ?3
             WHERE id = ?1",
            params![reminder.id, format_instant(trigger_at), format_instant(now)],
        )?;
        debug!(reminder_id = reminder.id, task_id, trigger_at = %trigger_at, "relative reminder armed");
        if let Some(updated) = fetch_reminder(conn, reminder.id)? {
            rescheduled.push(updated);
        }
    }
    Ok(rescheduled)
}

/// Merge a patch onto a stored reminder.
fn merge(existing: &Reminder, update: &ReminderUpdate) -> NewReminder {
    let mut merged = NewReminder {
        title: existing.title.clone(),
        description: existing.description.clone(),
        kind: existing.kind,
        trigger_at: existing.trigger_at,
        recurrence_rule: existing.recurrence_rule.clone(),
        remind_frequency_minutes: existing.remind_frequency_minutes,
        relative_to_task_id: existing.relative_to_task_id,
        relative_delay_minutes: existing.relative_delay_minutes,
        task_id: existing.task_id,
        file_reference_id: existing.file_reference_id,
        contact_id: existing.contact_id,
    };

    if let Some(kind) = update.kind {
        if kind != existing.kind {
            // Fields that only made sense for the old kind go unless the patch sets them.
            match kind {
                ReminderKind::OneTime => {
                    merged.recurrence_rule = None;
                    merged.relative_to_task_id = None;
                    merged.relative_delay_minutes = None;
                }
                ReminderKind::RecurringScheduled => {
                    merged.relative_to_task_id = None;
                    merged.relative_delay_minutes = None;
                }
                ReminderKind::RecurringRelative => {
                    merged.trigger_at = None;
                    merged.recurrence_rule = None;
                }
            }
            merged.kind = kind;
        }
    }

    if let Some(title) = &update.title {
        merged.title.clone_from(title);
    }
    if let Some(description) = &update.description {
        merged.description.clone_from(description);
    }
    if let Some(trigger_at) = update.trigger_at {
        merged.trigger_at = trigger_at;
    }
    if let Some(rule) = &update.recurrence_rule {
        merged.recurrence_rule.clone_from(rule);
    }
    if let Some(minutes) = update.remind_frequency_minutes {
        merged.remind_frequency_minutes = minutes;
    }
    if let Some(task) = update.relative_to_task_id {
        merged.relative_to_task_id = task;
    }
    if let Some(delay) = update.relative_delay_minutes {
        merged.relative_delay_minutes = delay;
    }
    if let Some(task) = update.task_id {
        merged.task_id = task;
    }
    if let Some(file) = update.file_reference_id {
        merged.file_reference_id = file;
    }
    if let Some(contact) = update.contact_id {
        merged.contact_id = contact;
    }
    merged
}

impl SqliteStore {
    /// Create a reminder after validating it.
    ///
    /// # Errors
    ///
    /// * `Validation` if the fields are inconsistent (nothing is stored).
    /// * `NotFound` if a linked task, file or contact is not the owner's.
    pub fn create_reminder(&self, owner_id: i64, spec: &NewReminder) -> Result<Reminder> {
        validate_reminder(spec)?;
        let now = self.now();
        let reminder = self.write(|tx| {
            check_references(tx, owner_id, spec)?;
            insert_reminder(tx, owner_id, spec, now)
        })?;
        info!(reminder_id = reminder.id, owner_id, kind = %reminder.kind, "reminder created");
        Ok(reminder)
    }

    /// Get one of the owner's reminders.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the reminder does not exist or is not the owner's.
    pub fn get_reminder(&self, owner_id: i64, id: i64) -> Result<Reminder> {
        let conn = self.open()?;
        fetch_owned_reminder(&conn, owner_id, id)
    }

    /// List the owner's reminders, soonest trigger first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_reminders(&self, owner_id: i64, active_only: bool) -> Result<Vec<Reminder>> {
        let conn = self.open()?;
        let sql = format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE owner_id = ?1 AND (?2 = 0 OR is_active = 1)
             ORDER BY trigger_at IS NULL, trigger_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let reminders = stmt
            .query_map(params![owner_id, active_only], parse_reminder)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(reminders)
    }

    /// Apply a partial update and re-validate the result.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the reminder or a newly linked record is not the owner's.
    /// * `Validation` if the merged reminder is inconsistent.
    pub fn update_reminder(&self, owner_id: i64, id: i64, update: &ReminderUpdate) -> Result<Reminder> {
        let now = self.now();
        self.write(|tx| {
            let existing = fetch_owned_reminder(tx, owner_id, id)?;
            if update.is_empty() {
                return Ok(existing);
            }
            let merged = merge(&existing, update);
            let stays_relative = existing.kind == ReminderKind::RecurringRelative
                && merged.kind == ReminderKind::RecurringRelative;
            check_fields(&merged, stays_relative)?;
            check_references(tx, owner_id, &merged)?;

            tx.execute(
                "UPDATE reminders SET
                    title = ?2, description = ?3, kind = ?4, trigger_at = ?5, recurrence_rule = ?6,
                    remind_frequency_minutes = ?7, relative_to_task_id = ?8,
                    relative_delay_minutes = ?9, task_id = ?10, file_reference_id = ?11,
                    contact_id = ?12, is_active = ?13, updated_at = ?14
                 WHERE id = ?1",
                params![
                    id,
                    merged.title,
                    merged.description,
                    merged.kind.as_str(),
                    merged.trigger_at.map(format_instant),
                    merged.recurrence_rule,
                    merged.remind_frequency_minutes,
                    merged.relative_to_task_id,
                    merged.relative_delay_minutes,
                    merged.task_id,
                    merged.file_reference_id,
                    merged.contact_id,
                    update.is_active.unwrap_or(existing.is_active),
                    format_instant(now),
                ],
            )?;
            debug!(reminder_id = id, "reminder updated");
            fetch_owned_reminder(tx, owner_id, id)
        })
    }

    /// Suppress notifications until `until`, or lift the snooze with `None`.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the reminder is not the owner's.
    /// * `AlreadyResolved` if it is inactive.
    pub fn snooze_reminder(&self, owner_id: i64, id: i64, until: Option<DateTime<Utc>>) -> Result<Reminder> {
        let now = self.now();
        self.write(|tx| {
            let reminder = fetch_owned_reminder(tx, owner_id, id)?;
            if !reminder.is_active {
                return Err(Error::AlreadyResolved { id });
            }
            if let Some(until) = until.filter(|u| !is_storable(*u)) {
                return Err(ValidationError::InstantOutOfRange(until.to_rfc3339()).into());
            }
            tx.execute(
                "UPDATE reminders SET snoozed_until = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, until.map(format_instant), format_instant(now)],
            )?;
            fetch_owned_reminder(tx, owner_id, id)
        })
    }

    /// Mark the current occurrence done.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `AlreadyResolved`.
    pub fn complete_reminder(&self, owner_id: i64, id: i64) -> Result<Reminder> {
        let now = self.now();
        self.write(|tx| resolve(tx, owner_id, id, ReminderAction::Completed, now))
    }

    /// Skip the current occurrence.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `AlreadyResolved`.
    pub fn skip_reminder(&self, owner_id: i64, id: i64) -> Result<Reminder> {
        let now = self.now();
        self.write(|tx| resolve(tx, owner_id, id, ReminderAction::Skipped, now))
    }

    /// Delete a reminder together with its history.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the reminder is not the owner's.
    pub fn delete_reminder(&self, owner_id: i64, id: i64) -> Result<()> {
        self.write(|tx| {
            fetch_owned_reminder(tx, owner_id, id)?;
            tx.execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    /// Arm the relative reminders anchored on a task that completed at `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn on_task_completed(&self, task_id: i64, completed_at: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let now = self.now();
        self.write(|tx| on_task_completed(tx, task_id, completed_at, now))
    }

    /// A reminder's history, newest first, optionally bounded by action instant.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the reminder is not the owner's.
    pub fn reminder_history(
        &self,
        owner_id: i64,
        id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReminderEvent>> {
        let conn = self.open()?;
        fetch_owned_reminder(&conn, owner_id, id)?;
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM reminder_events
             WHERE reminder_id = ?1
               AND (?2 IS NULL OR action_at >= ?2)
               AND (?3 IS NULL OR action_at <= ?3)
             ORDER BY action_at DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![id, from.map(format_instant), to.map(format_instant)], parse_event)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(events)
    }
}
