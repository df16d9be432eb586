//! `SQLite` record store for tasks, projects, reminders and their links.
//!
//! Every mutating operation runs inside an `IMMEDIATE` transaction. `SQLite`
//! admits one writer at a time, so two completions that touch the same
//! dependent recompute it one after the other and never interleave their
//! read-modify-write.

use crate::error::{Error, Result};
use crate::graph::node::{fetch_owned, DependencyNode};
use crate::graph::propagate;
use crate::models::{NewProject, NewTask, Project, ProjectStatus, Task, TaskStatus};
use crate::traits::{Clock, SystemClock};
use chrono::{DateTime, Datelike, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default database location relative to a base directory.
pub const DEFAULT_DB_PATH: &str = ".cadence/cadence.sqlite3";

/// How long a connection waits for the write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Format an instant for storage.
///
/// The fixed-width UTC form keeps lexical and chronological order identical,
/// which the due-reminder query relies on.
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Whether [`format_instant`] keeps `instant` in its fixed-width form.
///
/// Only four-digit years do; anything else would break the ordering.
#[must_use]
pub fn is_storable(instant: DateTime<Utc>) -> bool {
    (0..=9999).contains(&instant.year())
}

/// Parse an instant written by [`format_instant`].
///
/// # Errors
///
/// Returns an error if the text is not RFC 3339.
pub fn parse_instant_column(text: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc))
}

/// Read a required instant column.
pub(crate) fn instant_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_instant_column(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read an optional instant column.
pub(crate) fn opt_instant_at(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        parse_instant_column(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Map a stored enum string, reporting a conversion failure on bad data.
pub(crate) fn enum_at<T, E>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    parse(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Filter options for listing tasks.
#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    /// Filter by status.
    pub status: Option<TaskStatus>,
    /// Filter by project.
    pub project_id: Option<i64>,
}

/// SQLite-backed record store.
#[derive(Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("db_path", &self.db_path).finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Create a store at the given database path using the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_clock(db_path, Arc::new(SystemClock))
    }

    /// Create a store that reads the current time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn with_clock(db_path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = Self { db_path: db_path.as_ref().to_path_buf(), clock };
        store.init_schema()?;
        Ok(store)
    }

    /// Create a store at the default location under `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_dir(base_dir: &Path) -> Result<Self> {
        Self::new(base_dir.join(DEFAULT_DB_PATH))
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// The clock this store stamps records with.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Current time according to the store's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Open a connection to the database.
    pub(crate) fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    /// Run `f` inside a write transaction; it commits only if `f` succeeds.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Initialize the database schema.
    #[allow(clippy::too_many_lines)]
    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'on_hold', 'completed', 'cancelled')),
                completed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'in_progress', 'completed', 'blocked', 'cancelled')),
                project_id INTEGER REFERENCES projects(id) ON DELETE SET NULL,
                due_at TEXT,
                completed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- node_id depends on depends_on_id
            CREATE TABLE IF NOT EXISTS task_dependencies (
                node_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                depends_on_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                PRIMARY KEY (node_id, depends_on_id),
                CHECK (node_id != depends_on_id)
            );

            CREATE TABLE IF NOT EXISTS project_dependencies (
                node_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                depends_on_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                PRIMARY KEY (node_id, depends_on_id),
                CHECK (node_id != depends_on_id)
            );

            CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                email TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS file_references (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                original_filename TEXT NOT NULL,
                storage_path TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reminders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                title TEXT,
                description TEXT NOT NULL DEFAULT '',
                kind TEXT NOT NULL DEFAULT 'one_time'
                    CHECK (kind IN ('one_time', 'recurring_scheduled', 'recurring_relative')),
                trigger_at TEXT,
                recurrence_rule TEXT,
                remind_frequency_minutes INTEGER,
                relative_to_task_id INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
                relative_delay_minutes INTEGER,
                last_notified_at TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                snoozed_until TEXT,
                task_id INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
                file_reference_id INTEGER REFERENCES file_references(id) ON DELETE SET NULL,
                contact_id INTEGER REFERENCES contacts(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Append-only; removed only together with the parent reminder
            CREATE TABLE IF NOT EXISTS reminder_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reminder_id INTEGER NOT NULL REFERENCES reminders(id) ON DELETE CASCADE,
                expected_trigger_at TEXT NOT NULL,
                action_at TEXT NOT NULL,
                action TEXT NOT NULL CHECK (action IN ('triggered', 'completed', 'skipped'))
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner_id);
            CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);
            CREATE INDEX IF NOT EXISTS idx_task_dependencies_depends_on ON task_dependencies(depends_on_id);
            CREATE INDEX IF NOT EXISTS idx_project_dependencies_depends_on ON project_dependencies(depends_on_id);
            CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders(is_active, trigger_at);
            CREATE INDEX IF NOT EXISTS idx_reminders_owner ON reminders(owner_id);
            CREATE INDEX IF NOT EXISTS idx_reminders_relative ON reminders(relative_to_task_id);
            CREATE INDEX IF NOT EXISTS idx_reminder_events_reminder ON reminder_events(reminder_id);
            ",
        )?;

        Ok(())
    }

    /// Check that a row with `id` exists in `table` and belongs to `owner_id`.
    pub(crate) fn owns(conn: &Connection, table: &str, owner_id: i64, id: i64) -> Result<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1 AND owner_id = ?2)");
        Ok(conn.query_row(&sql, params![id, owner_id], |row| row.get(0))?)
    }

    // Tasks

    /// Create a task in the `pending` state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `project_id` is not one of the owner's projects.
    pub fn create_task(&self, owner_id: i64, new: &NewTask) -> Result<Task> {
        let now = format_instant(self.now());
        self.write(|tx| {
            if let Some(project_id) = new.project_id {
                if !Self::owns(tx, "projects", owner_id, project_id)? {
                    return Err(Error::not_found("project", project_id));
                }
            }
            tx.execute(
                "INSERT INTO tasks (owner_id, title, description, project_id, due_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    owner_id,
                    new.title,
                    new.description,
                    new.project_id,
                    new.due_at.map(format_instant),
                    now
                ],
            )?;
            let id = tx.last_insert_rowid();
            debug!(task_id = id, owner_id, "task created");
            fetch_owned::<Task>(tx, owner_id, id)
        })
    }

    /// Get one of the owner's tasks.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist or is not the owner's.
    pub fn get_task(&self, owner_id: i64, id: i64) -> Result<Task> {
        let conn = self.open()?;
        fetch_owned::<Task>(&conn, owner_id, id)
    }

    /// List the owner's tasks, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_tasks(&self, owner_id: i64, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = self.open()?;

        let mut conditions = vec!["owner_id = ?"];
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner_id)];

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(project_id) = filter.project_id {
            conditions.push("project_id = ?");
            values.push(Box::new(project_id));
        }

        let sql = format!(
            "SELECT {} FROM tasks WHERE {} ORDER BY created_at ASC, id ASC",
            Task::COLUMNS,
            conditions.join(" AND ")
        );
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(AsRef::as_ref).collect();
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt.query_map(params.as_slice(), Task::from_row)?.collect::<rusqlite::Result<_>>()?;
        Ok(tasks)
    }

    /// Tasks the owner can work on now (pending or in progress).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn ready_tasks(&self, owner_id: i64) -> Result<Vec<Task>> {
        let conn = self.open()?;
        let sql = format!(
            "SELECT {} FROM tasks
             WHERE owner_id = ?1 AND status IN ('pending', 'in_progress')
             ORDER BY due_at IS NULL, due_at ASC, id ASC",
            Task::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt.query_map(params![owner_id], Task::from_row)?.collect::<rusqlite::Result<_>>()?;
        Ok(tasks)
    }

    /// Delete a task.
    ///
    /// Relative reminders anchored on the task are deactivated and the former
    /// dependents are recomputed, since their edge to this task disappears.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist or is not the owner's.
    pub fn delete_task(&self, owner_id: i64, id: i64) -> Result<()> {
        let now = self.now();
        self.write(|tx| {
            fetch_owned::<Task>(tx, owner_id, id)?;
            let dependents = crate::graph::edges::dependent_ids::<Task>(tx, id)?;

            tx.execute(
                "UPDATE reminders SET is_active = 0, updated_at = ?2
                 WHERE relative_to_task_id = ?1 AND is_active = 1",
                params![id, format_instant(now)],
            )?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;

            for dependent in dependents {
                propagate::recompute::<Task>(tx, dependent, now)?;
            }
            debug!(task_id = id, owner_id, "task deleted");
            Ok(())
        })
    }

    // Projects

    /// Create a project in the `active` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_project(&self, owner_id: i64, new: &NewProject) -> Result<Project> {
        let now = format_instant(self.now());
        self.write(|tx| {
            tx.execute(
                "INSERT INTO projects (owner_id, name, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![owner_id, new.name, new.description, now],
            )?;
            let id = tx.last_insert_rowid();
            debug!(project_id = id, owner_id, "project created");
            fetch_owned::<Project>(tx, owner_id, id)
        })
    }

    /// Get one of the owner's projects.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project does not exist or is not the owner's.
    pub fn get_project(&self, owner_id: i64, id: i64) -> Result<Project> {
        let conn = self.open()?;
        fetch_owned::<Project>(&conn, owner_id, id)
    }

    /// List the owner's projects, optionally by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_projects(&self, owner_id: i64, status: Option<ProjectStatus>) -> Result<Vec<Project>> {
        let conn = self.open()?;
        let sql = format!(
            "SELECT {} FROM projects
             WHERE owner_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY id ASC",
            Project::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let projects = stmt
            .query_map(params![owner_id, status.map(|s| s.as_str())], Project::from_row)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(projects)
    }

    /// Delete a project and recompute its former dependents.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project does not exist or is not the owner's.
    pub fn delete_project(&self, owner_id: i64, id: i64) -> Result<()> {
        let now = self.now();
        self.write(|tx| {
            fetch_owned::<Project>(tx, owner_id, id)?;
            let dependents = crate::graph::edges::dependent_ids::<Project>(tx, id)?;
            tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
            for dependent in dependents {
                propagate::recompute::<Project>(tx, dependent, now)?;
            }
            debug!(project_id = id, owner_id, "project deleted");
            Ok(())
        })
    }

    // Contacts and files. Only what reminder validation needs.

    /// Record a contact and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_contact(&self, owner_id: i64, name: &str, email: Option<&str>) -> Result<i64> {
        let now = format_instant(self.now());
        self.write(|tx| {
            tx.execute(
                "INSERT INTO contacts (owner_id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![owner_id, name, email, now],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Record a stored file and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (for example a duplicate storage path).
    pub fn create_file_reference(
        &self,
        owner_id: i64,
        original_filename: &str,
        storage_path: &str,
    ) -> Result<i64> {
        let now = format_instant(self.now());
        self.write(|tx| {
            tx.execute(
                "INSERT INTO file_references (owner_id, original_filename, storage_path, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![owner_id, original_filename, storage_path, now],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClock;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FakeClock::new(Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()));
        let store = SqliteStore::with_clock(dir.path().join("test.db"), clock).unwrap();
        (dir, store)
    }

    #[test]
    fn test_instant_format_is_fixed_width_and_ordered() {
        let a = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        let c = a + chrono::Duration::hours(15);
        assert_eq!(format_instant(a), "2025-01-06T09:00:00.000000Z");
        assert_eq!(format_instant(a).len(), format_instant(b).len());
        assert!(format_instant(a) < format_instant(b));
        assert!(format_instant(b) < format_instant(c));
        assert_eq!(parse_instant_column(&format_instant(b)).unwrap(), b);
    }

    #[test]
    fn test_only_four_digit_years_are_storable() {
        assert!(is_storable(Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()));
        assert!(is_storable(Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).unwrap()));
        assert!(!is_storable(Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap()));
        assert!(!is_storable(Utc.with_ymd_and_hms(-1, 12, 31, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_create_and_get_task() {
        let (_dir, store) = create_test_store();
        let task = store.create_task(1, &NewTask::titled("Write report")).unwrap();
        assert_eq!(task.title, "Write report");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.completed_at, None);
        assert_eq!(task.created_at, store.now());

        let fetched = store.get_task(1, task.id).unwrap();
        assert_eq!(fetched, task);
    }

    #[test]
    fn test_get_task_of_other_owner_is_not_found() {
        let (_dir, store) = create_test_store();
        let task = store.create_task(1, &NewTask::titled("Private")).unwrap();
        let err = store.get_task(2, task.id).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_create_task_rejects_foreign_project() {
        let (_dir, store) = create_test_store();
        let project = store.create_project(2, &NewProject::named("Theirs")).unwrap();
        let new = NewTask { project_id: Some(project.id), ..NewTask::titled("Mine") };
        let err = store.create_task(1, &new).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "project", .. }));
    }

    #[test]
    fn test_list_tasks_with_filters() {
        let (_dir, store) = create_test_store();
        let project = store.create_project(1, &NewProject::named("Home")).unwrap();
        store.create_task(1, &NewTask::titled("Loose")).unwrap();
        let in_project = NewTask { project_id: Some(project.id), ..NewTask::titled("Paint") };
        let painted = store.create_task(1, &in_project).unwrap();
        store.create_task(2, &NewTask::titled("Someone else")).unwrap();

        assert_eq!(store.list_tasks(1, &TaskFilter::default()).unwrap().len(), 2);
        let filtered =
            store.list_tasks(1, &TaskFilter { project_id: Some(project.id), ..Default::default() }).unwrap();
        assert_eq!(filtered, vec![painted]);
        let pending = store
            .list_tasks(1, &TaskFilter { status: Some(TaskStatus::Completed), ..Default::default() })
            .unwrap();
        assert!(pending.is_empty());
    }

    #[test]
    fn test_delete_task_is_owner_scoped() {
        let (_dir, store) = create_test_store();
        let task = store.create_task(1, &NewTask::titled("Keep")).unwrap();
        assert!(store.delete_task(2, task.id).unwrap_err().is_not_found());
        store.delete_task(1, task.id).unwrap();
        assert!(store.get_task(1, task.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_projects_by_status() {
        let (_dir, store) = create_test_store();
        store.create_project(1, &NewProject::named("A")).unwrap();
        store.create_project(1, &NewProject::named("B")).unwrap();
        assert_eq!(store.list_projects(1, None).unwrap().len(), 2);
        assert_eq!(store.list_projects(1, Some(ProjectStatus::Active)).unwrap().len(), 2);
        assert!(store.list_projects(1, Some(ProjectStatus::OnHold)).unwrap().is_empty());
    }

    #[test]
    fn test_contacts_and_files_are_owned() {
        let (_dir, store) = create_test_store();
        let contact = store.create_contact(1, "Ada", Some("ada@example.com")).unwrap();
        let file = store.create_file_reference(1, "plan.pdf", "s3://bucket/plan.pdf").unwrap();
        let conn = store.open().unwrap();
        assert!(SqliteStore::owns(&conn, "contacts", 1, contact).unwrap());
        assert!(!SqliteStore::owns(&conn, "contacts", 2, contact).unwrap());
        assert!(SqliteStore::owns(&conn, "file_references", 1, file).unwrap());
    }

    #[test]
    fn test_duplicate_storage_path_is_rejected() {
        let (_dir, store) = create_test_store();
        store.create_file_reference(1, "a.pdf", "s3://bucket/a.pdf").unwrap();
        assert!(store.create_file_reference(1, "b.pdf", "s3://bucket/a.pdf").is_err());
    }

    #[test]
    fn test_in_dir_creates_database() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::in_dir(dir.path()).unwrap();
        assert!(store.db_path().ends_with("cadence.sqlite3"));
        assert!(store.db_path().exists());
    }
}
