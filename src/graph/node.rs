//! The capability shared by tasks and projects: an owned, statused node that
//! can sit in a dependency graph.

use crate::error::{Error, Result};
use crate::models::{Project, ProjectStatus, Task, TaskStatus, UnknownVariant};
use crate::store::{enum_at, format_instant, instant_at, opt_instant_at};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// The status vocabulary of a node kind.
pub trait NodeStatus: Copy + Eq + std::fmt::Debug + std::fmt::Display {
    /// The finished state; the only one that satisfies a dependency.
    const DONE: Self;
    /// The state a node is put in while a dependency is unfinished.
    const BLOCKED: Self;
    /// The state a node returns to when it is released.
    const RELEASED: Self;

    /// Stored form.
    fn db_value(self) -> &'static str;

    /// Parse the stored or user-facing name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown.
    fn parse(value: &str) -> std::result::Result<Self, UnknownVariant>;
}

impl NodeStatus for TaskStatus {
    const DONE: Self = Self::Completed;
    const BLOCKED: Self = Self::Blocked;
    const RELEASED: Self = Self::Pending;

    fn db_value(self) -> &'static str {
        self.as_str()
    }

    fn parse(value: &str) -> std::result::Result<Self, UnknownVariant> {
        Self::from_str(value)
    }
}

impl NodeStatus for ProjectStatus {
    const DONE: Self = Self::Completed;
    const BLOCKED: Self = Self::OnHold;
    const RELEASED: Self = Self::Active;

    fn db_value(self) -> &'static str {
        self.as_str()
    }

    fn parse(value: &str) -> std::result::Result<Self, UnknownVariant> {
        Self::from_str(value)
    }
}

/// A record that can depend on, and be depended on by, records of its own kind.
///
/// The propagation and edge operations are written once against this trait.
pub trait DependencyNode: Sized {
    /// The node's status vocabulary.
    type Status: NodeStatus;

    /// Name used in errors and logs.
    const ENTITY: &'static str;
    /// Table holding the nodes.
    const TABLE: &'static str;
    /// Edge table; `node_id` depends on `depends_on_id`.
    const EDGE_TABLE: &'static str;
    /// Select list understood by [`DependencyNode::from_row`].
    const COLUMNS: &'static str;

    /// Build a node from a row selected with [`DependencyNode::COLUMNS`].
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or malformed.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Row id.
    fn id(&self) -> i64;
    /// Owning user.
    fn owner_id(&self) -> i64;
    /// Current status.
    fn status(&self) -> Self::Status;
    /// When the node was completed, if it is done.
    fn completed_at(&self) -> Option<DateTime<Utc>>;
}

impl DependencyNode for Task {
    type Status = TaskStatus;

    const ENTITY: &'static str = "task";
    const TABLE: &'static str = "tasks";
    const EDGE_TABLE: &'static str = "task_dependencies";
    const COLUMNS: &'static str = "id, owner_id, title, description, status, project_id, due_at, \
                                   completed_at, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            status: enum_at(row, 4, TaskStatus::from_str)?,
            project_id: row.get(5)?,
            due_at: opt_instant_at(row, 6)?,
            completed_at: opt_instant_at(row, 7)?,
            created_at: instant_at(row, 8)?,
            updated_at: instant_at(row, 9)?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn owner_id(&self) -> i64 {
        self.owner_id
    }

    fn status(&self) -> TaskStatus {
        self.status
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

impl DependencyNode for Project {
    type Status = ProjectStatus;

    const ENTITY: &'static str = "project";
    const TABLE: &'static str = "projects";
    const EDGE_TABLE: &'static str = "project_dependencies";
    const COLUMNS: &'static str =
        "id, owner_id, name, description, status, completed_at, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            status: enum_at(row, 4, ProjectStatus::from_str)?,
            completed_at: opt_instant_at(row, 5)?,
            created_at: instant_at(row, 6)?,
            updated_at: instant_at(row, 7)?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn owner_id(&self) -> i64 {
        self.owner_id
    }

    fn status(&self) -> ProjectStatus {
        self.status
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

/// Parse a status name for a node kind, e.g. from the command line.
///
/// # Errors
///
/// Returns an error if the name is not part of the kind's vocabulary.
pub fn parse_status<N: DependencyNode>(value: &str) -> std::result::Result<N::Status, UnknownVariant> {
    N::Status::parse(value)
}

/// Load a node by id regardless of owner.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fetch<N: DependencyNode>(conn: &Connection, id: i64) -> Result<Option<N>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?1", N::COLUMNS, N::TABLE);
    Ok(conn.query_row(&sql, params![id], N::from_row).optional()?)
}

/// Load a node that must belong to `owner_id`.
///
/// Missing and foreign nodes are reported the same way.
///
/// # Errors
///
/// Returns `NotFound` if the node does not exist or is not the owner's.
pub fn fetch_owned<N: DependencyNode>(conn: &Connection, owner_id: i64, id: i64) -> Result<N> {
    match fetch::<N>(conn, id)? {
        Some(node) if node.owner_id() == owner_id => Ok(node),
        _ => Err(Error::not_found(N::ENTITY, id)),
    }
}

/// Write a node's status, keeping `completed_at` set exactly while it is done.
///
/// An existing completion instant survives a repeated write of the done state.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn write_status<N: DependencyNode>(
    conn: &Connection,
    id: i64,
    status: N::Status,
    now: DateTime<Utc>,
) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET
            status = ?1,
            completed_at = CASE WHEN ?1 = ?2 THEN COALESCE(completed_at, ?3) ELSE NULL END,
            updated_at = ?3
         WHERE id = ?4",
        N::TABLE
    );
    conn.execute(
        &sql,
        params![status.db_value(), N::Status::DONE.db_value(), format_instant(now), id],
    )?;
    Ok(())
}
