//! Status transitions and the work that follows a completion.
//!
//! Completing a node cascades to its dependents; completing a task also arms
//! the relative reminders anchored on it. The status write and everything it
//! triggers commit together.

use crate::error::Result;
use crate::graph::node::{fetch_owned, write_status};
use crate::graph::propagate::{cascade_from_completion, recompute, recompute_dependents};
use crate::graph::{DependencyNode, NodeStatus};
use crate::models::{Project, ProjectStatus, Reminder, Task, TaskStatus};
use crate::reminders::lifecycle;
use crate::store::SqliteStore;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

/// What a status change did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange<N> {
    /// The node after the change.
    pub node: N,
    /// Whether the node moved into its done state.
    pub entered_done: bool,
    /// Dependents released by the change, ascending by id.
    pub released: Vec<N>,
    /// Relative reminders armed by a task completion.
    pub rescheduled: Vec<Reminder>,
}

impl<N> StatusChange<N> {
    const fn unchanged(node: N) -> Self {
        Self { node, entered_done: false, released: Vec::new(), rescheduled: Vec::new() }
    }
}

/// Move `id` to `status` and bring the graph back in line.
///
/// * Setting the current status again changes nothing.
/// * Entering done cascades to the direct dependents.
/// * Leaving done recomputes the dependents, which may block them again.
/// * Any target other than done is followed by a recompute of the node itself,
///   so a manual status cannot contradict its dependencies.
///
/// # Errors
///
/// Returns `NotFound` if the node is not the owner's.
pub fn transition<N: DependencyNode>(
    conn: &Connection,
    owner_id: i64,
    id: i64,
    status: N::Status,
    now: DateTime<Utc>,
) -> Result<StatusChange<N>> {
    let current = fetch_owned::<N>(conn, owner_id, id)?;
    let from = current.status();
    if from == status {
        return Ok(StatusChange::unchanged(current));
    }

    let done = N::Status::DONE;
    write_status::<N>(conn, id, status, now)?;

    let released = if status == done {
        cascade_from_completion::<N>(conn, id, now)?
    } else {
        let mut released = Vec::new();
        if from == done {
            released = recompute_dependents::<N>(conn, id, now)?;
        }
        recompute::<N>(conn, id, now)?;
        released
    };

    let node = fetch_owned::<N>(conn, owner_id, id)?;
    info!(
        entity = N::ENTITY,
        id,
        from = %from,
        to = %node.status(),
        released = released.len(),
        "status changed"
    );
    Ok(StatusChange { node, entered_done: status == done, released, rescheduled: Vec::new() })
}

impl SqliteStore {
    /// Set a task's status.
    ///
    /// Completing the task also arms the relative reminders anchored on it,
    /// at `completed_at + delay`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task is not the owner's; nothing is written on error.
    pub fn set_task_status(&self, owner_id: i64, id: i64, status: TaskStatus) -> Result<StatusChange<Task>> {
        let now = self.now();
        self.write(|tx| {
            let mut change = transition::<Task>(tx, owner_id, id, status, now)?;
            if change.entered_done {
                let completed_at = change.node.completed_at.unwrap_or(now);
                change.rescheduled = lifecycle::on_task_completed(tx, id, completed_at, now)?;
            }
            Ok(change)
        })
    }

    /// Mark a task completed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task is not the owner's.
    pub fn complete_task(&self, owner_id: i64, id: i64) -> Result<StatusChange<Task>> {
        self.set_task_status(owner_id, id, TaskStatus::Completed)
    }

    /// Set a project's status.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project is not the owner's.
    pub fn set_project_status(
        &self,
        owner_id: i64,
        id: i64,
        status: ProjectStatus,
    ) -> Result<StatusChange<Project>> {
        let now = self.now();
        self.write(|tx| transition::<Project>(tx, owner_id, id, status, now))
    }

    /// Mark a project completed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project is not the owner's.
    pub fn complete_project(&self, owner_id: i64, id: i64) -> Result<StatusChange<Project>> {
        self.set_project_status(owner_id, id, ProjectStatus::Completed)
    }
}
