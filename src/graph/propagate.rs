//! Blocked/unblocked status propagation.
//!
//! A node is blocked exactly while it has a dependency that is not done. A
//! dependency that no longer exists counts as not done.

use super::edges::dependent_ids;
use super::node::{fetch, write_status, DependencyNode, NodeStatus};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

/// Whether `node` has at least one dependency that is not done.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn has_unfinished_dependency<N: DependencyNode>(conn: &Connection, node: i64) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(
            SELECT 1 FROM {edges} e
            LEFT JOIN {nodes} n ON n.id = e.depends_on_id
            WHERE e.node_id = ?1 AND (n.id IS NULL OR n.status != ?2)
        )",
        edges = N::EDGE_TABLE,
        nodes = N::TABLE
    );
    Ok(conn.query_row(&sql, params![node, N::Status::DONE.db_value()], |row| row.get(0))?)
}

/// Bring `node`'s status in line with its dependencies.
///
/// Returns `true` only when the node moved from blocked to its released
/// state. Blocking a done node also recomputes its dependents, since they
/// lose a finished dependency. Recomputing twice in a row changes nothing the
/// second time.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn recompute<N: DependencyNode>(conn: &Connection, node: i64, now: DateTime<Utc>) -> Result<bool> {
    let Some(current) = fetch::<N>(conn, node)? else {
        return Ok(false);
    };
    let blocked = N::Status::BLOCKED;
    let should_block = has_unfinished_dependency::<N>(conn, node)?;

    if should_block && current.status() != blocked {
        write_status::<N>(conn, node, blocked, now)?;
        debug!(entity = N::ENTITY, node, from = %current.status(), "blocked");
        // A node that stops being done no longer satisfies its dependents.
        if current.status() == N::Status::DONE {
            recompute_dependents::<N>(conn, node, now)?;
        }
        Ok(false)
    } else if !should_block && current.status() == blocked {
        write_status::<N>(conn, node, N::Status::RELEASED, now)?;
        debug!(entity = N::ENTITY, node, "released");
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Recompute every direct dependent of `node`, returning the ones released.
///
/// Only one level is visited. A released dependent is not done, so nothing
/// further downstream can change because of it.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn recompute_dependents<N: DependencyNode>(
    conn: &Connection,
    node: i64,
    now: DateTime<Utc>,
) -> Result<Vec<N>> {
    let mut released = Vec::new();
    for dependent in dependent_ids::<N>(conn, node)? {
        if recompute::<N>(conn, dependent, now)? {
            if let Some(updated) = fetch::<N>(conn, dependent)? {
                released.push(updated);
            }
        }
    }
    Ok(released)
}

/// Fan out from a node that just reached its done state.
///
/// Returns the dependents that were released as a result, ascending by id.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn cascade_from_completion<N: DependencyNode>(
    conn: &Connection,
    node: i64,
    now: DateTime<Utc>,
) -> Result<Vec<N>> {
    let released = recompute_dependents::<N>(conn, node, now)?;
    if !released.is_empty() {
        debug!(entity = N::ENTITY, node, released = released.len(), "completion released dependents");
    }
    Ok(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edges::add_edge;
    use crate::graph::node::write_status;
    use crate::models::{NewProject, NewTask, Project, ProjectStatus, Task, TaskStatus};
    use crate::store::SqliteStore;
    use crate::testing::FakeClock;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FakeClock::new(Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap()));
        let store = SqliteStore::with_clock(dir.path().join("test.db"), clock).unwrap();
        (dir, store)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 13, 0, 0).unwrap()
    }

    fn status_of(conn: &Connection, id: i64) -> TaskStatus {
        fetch::<Task>(conn, id).unwrap().unwrap().status
    }

    #[test]
    fn test_recompute_missing_node_is_false() {
        let (_dir, store) = create_test_store();
        let conn = store.open().unwrap();
        assert!(!recompute::<Task>(&conn, 77, now()).unwrap());
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let b = store.create_task(1, &NewTask::titled("B")).unwrap();
        let conn = store.open().unwrap();
        add_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap();

        write_status::<Task>(&conn, a.id, TaskStatus::Completed, now()).unwrap();
        assert!(recompute::<Task>(&conn, b.id, now()).unwrap());
        assert!(!recompute::<Task>(&conn, b.id, now()).unwrap());
        assert_eq!(status_of(&conn, b.id), TaskStatus::Pending);
    }

    #[test]
    fn test_recompute_blocks_in_progress_node() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let b = store.create_task(1, &NewTask::titled("B")).unwrap();
        let conn = store.open().unwrap();
        write_status::<Task>(&conn, b.id, TaskStatus::InProgress, now()).unwrap();

        add_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap();
        assert_eq!(status_of(&conn, b.id), TaskStatus::Blocked);
    }

    #[test]
    fn test_missing_dependency_counts_as_unfinished() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let b = store.create_task(1, &NewTask::titled("B")).unwrap();
        let conn = store.open().unwrap();
        add_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap();
        write_status::<Task>(&conn, a.id, TaskStatus::Completed, now()).unwrap();
        recompute::<Task>(&conn, b.id, now()).unwrap();

        // Leave a dangling edge behind by deleting without foreign keys.
        conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
        conn.execute("DELETE FROM tasks WHERE id = ?1", params![a.id]).unwrap();
        assert!(has_unfinished_dependency::<Task>(&conn, b.id).unwrap());
        assert!(!recompute::<Task>(&conn, b.id, now()).unwrap());
        assert_eq!(status_of(&conn, b.id), TaskStatus::Blocked);
    }

    #[test]
    fn test_cascade_releases_only_fully_satisfied_dependents() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let b = store.create_task(1, &NewTask::titled("B")).unwrap();
        let c = store.create_task(1, &NewTask::titled("C")).unwrap();
        let d = store.create_task(1, &NewTask::titled("D")).unwrap();
        let conn = store.open().unwrap();
        add_edge::<Task>(&conn, 1, c.id, a.id, now()).unwrap();
        add_edge::<Task>(&conn, 1, d.id, a.id, now()).unwrap();
        add_edge::<Task>(&conn, 1, d.id, b.id, now()).unwrap();

        write_status::<Task>(&conn, a.id, TaskStatus::Completed, now()).unwrap();
        let released = cascade_from_completion::<Task>(&conn, a.id, now()).unwrap();
        assert_eq!(released.iter().map(|t| t.id).collect::<Vec<_>>(), vec![c.id]);
        assert_eq!(status_of(&conn, d.id), TaskStatus::Blocked);
    }

    #[test]
    fn test_cascade_is_single_level() {
        let (_dir, store) = create_test_store();
        let a = store.create_project(1, &NewProject::named("A")).unwrap();
        let b = store.create_project(1, &NewProject::named("B")).unwrap();
        let c = store.create_project(1, &NewProject::named("C")).unwrap();
        let conn = store.open().unwrap();
        add_edge::<Project>(&conn, 1, b.id, a.id, now()).unwrap();
        add_edge::<Project>(&conn, 1, c.id, b.id, now()).unwrap();

        write_status::<Project>(&conn, a.id, ProjectStatus::Completed, now()).unwrap();
        let released = cascade_from_completion::<Project>(&conn, a.id, now()).unwrap();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].status, ProjectStatus::Active);
        let c_after = fetch::<Project>(&conn, c.id).unwrap().unwrap();
        assert_eq!(c_after.status, ProjectStatus::OnHold);
    }
}
