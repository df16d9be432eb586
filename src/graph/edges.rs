//! Dependency edges between nodes of the same kind.
//!
//! An edge `(node, depends_on)` means `node` cannot proceed until
//! `depends_on` is done. Both ends always belong to the same owner.

use super::node::{fetch_owned, DependencyNode};
use super::propagate;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use tracing::debug;

/// Whether the edge `(node, depends_on)` is stored.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn edge_exists<N: DependencyNode>(conn: &Connection, node: i64, depends_on: i64) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE node_id = ?1 AND depends_on_id = ?2)",
        N::EDGE_TABLE
    );
    Ok(conn.query_row(&sql, params![node, depends_on], |row| row.get(0))?)
}

/// Ids `node` depends on, ascending.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn dependency_ids<N: DependencyNode>(conn: &Connection, node: i64) -> Result<Vec<i64>> {
    let sql = format!(
        "SELECT depends_on_id FROM {} WHERE node_id = ?1 ORDER BY depends_on_id",
        N::EDGE_TABLE
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt.query_map(params![node], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
    Ok(ids)
}

/// Ids that depend on `node`, ascending.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn dependent_ids<N: DependencyNode>(conn: &Connection, node: i64) -> Result<Vec<i64>> {
    let sql = format!(
        "SELECT node_id FROM {} WHERE depends_on_id = ?1 ORDER BY node_id",
        N::EDGE_TABLE
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt.query_map(params![node], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
    Ok(ids)
}

/// Check if adding `(node, depends_on)` would close a cycle.
///
/// Depth-first walk over the dependencies of `depends_on` looking for `node`.
fn would_create_cycle<N: DependencyNode>(conn: &Connection, node: i64, depends_on: i64) -> Result<bool> {
    let mut visited = HashSet::new();
    let mut stack = vec![depends_on];

    while let Some(current) = stack.pop() {
        if current == node {
            return Ok(true);
        }
        if visited.insert(current) {
            stack.extend(dependency_ids::<N>(conn, current)?);
        }
    }

    Ok(false)
}

/// Record that `node` depends on `depends_on`, then recompute `node`.
///
/// Adding an edge that already exists is a successful no-op. Returns the node
/// as it stands after the change.
///
/// # Errors
///
/// * `SelfDependency` if both ids are equal.
/// * `NotFound` if either node is missing or not the owner's.
/// * `CircularDependency` if the edge would close a cycle.
pub fn add_edge<N: DependencyNode>(
    conn: &Connection,
    owner_id: i64,
    node: i64,
    depends_on: i64,
    now: DateTime<Utc>,
) -> Result<N> {
    if node == depends_on {
        return Err(Error::SelfDependency { entity: N::ENTITY, id: node });
    }
    let current = fetch_owned::<N>(conn, owner_id, node)?;
    fetch_owned::<N>(conn, owner_id, depends_on)?;

    if edge_exists::<N>(conn, node, depends_on)? {
        return Ok(current);
    }
    if would_create_cycle::<N>(conn, node, depends_on)? {
        return Err(Error::CircularDependency { node, depends_on });
    }

    let sql = format!("INSERT INTO {} (node_id, depends_on_id) VALUES (?1, ?2)", N::EDGE_TABLE);
    conn.execute(&sql, params![node, depends_on])?;
    debug!(entity = N::ENTITY, node, depends_on, "dependency added");

    propagate::recompute::<N>(conn, node, now)?;
    fetch_owned::<N>(conn, owner_id, node)
}

/// Remove the edge `(node, depends_on)`, then recompute `node`.
///
/// # Errors
///
/// * `NotFound` if either node is missing or not the owner's, or the edge does not exist.
pub fn remove_edge<N: DependencyNode>(
    conn: &Connection,
    owner_id: i64,
    node: i64,
    depends_on: i64,
    now: DateTime<Utc>,
) -> Result<N> {
    fetch_owned::<N>(conn, owner_id, node)?;
    fetch_owned::<N>(conn, owner_id, depends_on)?;

    let sql = format!("DELETE FROM {} WHERE node_id = ?1 AND depends_on_id = ?2", N::EDGE_TABLE);
    let rows = conn.execute(&sql, params![node, depends_on])?;
    if rows == 0 {
        return Err(Error::not_found("dependency", depends_on));
    }
    debug!(entity = N::ENTITY, node, depends_on, "dependency removed");

    propagate::recompute::<N>(conn, node, now)?;
    fetch_owned::<N>(conn, owner_id, node)
}

/// Ids of the owner's node's dependencies.
///
/// # Errors
///
/// Returns `NotFound` if the node is missing or not the owner's.
pub fn dependencies_of<N: DependencyNode>(conn: &Connection, owner_id: i64, node: i64) -> Result<Vec<i64>> {
    fetch_owned::<N>(conn, owner_id, node)?;
    dependency_ids::<N>(conn, node)
}

/// Ids of the nodes that depend on the owner's node.
///
/// # Errors
///
/// Returns `NotFound` if the node is missing or not the owner's.
pub fn dependents_of<N: DependencyNode>(conn: &Connection, owner_id: i64, node: i64) -> Result<Vec<i64>> {
    fetch_owned::<N>(conn, owner_id, node)?;
    dependent_ids::<N>(conn, node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::fetch;
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
        Utc.with_ymd_and_hms(2025, 2, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_add_edge_blocks_node() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let b = store.create_task(1, &NewTask::titled("B")).unwrap();
        let conn = store.open().unwrap();

        let updated = add_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap();
        assert_eq!(updated.status, TaskStatus::Blocked);
        assert_eq!(dependencies_of::<Task>(&conn, 1, b.id).unwrap(), vec![a.id]);
        assert_eq!(dependents_of::<Task>(&conn, 1, a.id).unwrap(), vec![b.id]);
    }

    #[test]
    fn test_add_edge_twice_is_idempotent() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let b = store.create_task(1, &NewTask::titled("B")).unwrap();
        let conn = store.open().unwrap();

        add_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap();
        add_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap();
        assert_eq!(dependencies_of::<Task>(&conn, 1, b.id).unwrap(), vec![a.id]);
    }

    #[test]
    fn test_self_dependency_rejected_and_nothing_stored() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let conn = store.open().unwrap();

        let err = add_edge::<Task>(&conn, 1, a.id, a.id, now()).unwrap_err();
        assert!(matches!(err, Error::SelfDependency { entity: "task", .. }));
        assert!(dependencies_of::<Task>(&conn, 1, a.id).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_endpoint_is_not_found() {
        let (_dir, store) = create_test_store();
        let mine = store.create_task(1, &NewTask::titled("Mine")).unwrap();
        let theirs = store.create_task(2, &NewTask::titled("Theirs")).unwrap();
        let conn = store.open().unwrap();

        assert!(add_edge::<Task>(&conn, 1, mine.id, theirs.id, now()).unwrap_err().is_not_found());
        assert!(add_edge::<Task>(&conn, 1, theirs.id, mine.id, now()).unwrap_err().is_not_found());
        assert!(add_edge::<Task>(&conn, 1, mine.id, 4242, now()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_cycle_rejected() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let b = store.create_task(1, &NewTask::titled("B")).unwrap();
        let c = store.create_task(1, &NewTask::titled("C")).unwrap();
        let conn = store.open().unwrap();

        add_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap();
        add_edge::<Task>(&conn, 1, c.id, b.id, now()).unwrap();
        let err = add_edge::<Task>(&conn, 1, a.id, c.id, now()).unwrap_err();
        assert!(matches!(err, Error::CircularDependency { .. }));
        let a_after = fetch::<Task>(&conn, a.id).unwrap().unwrap();
        assert_eq!(a_after.status, TaskStatus::Pending);
    }

    #[test]
    fn test_blocking_a_done_node_reblocks_its_dependents() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let b = store.create_task(1, &NewTask::titled("B")).unwrap();
        let c = store.create_task(1, &NewTask::titled("C")).unwrap();
        store.add_dependency::<Task>(1, c.id, b.id).unwrap();
        store.complete_task(1, b.id).unwrap();
        assert_eq!(store.get_task(1, c.id).unwrap().status, TaskStatus::Pending);

        let conn = store.open().unwrap();
        let updated = add_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap();
        assert_eq!(updated.status, TaskStatus::Blocked);
        assert_eq!(updated.completed_at, None);
        assert_eq!(fetch::<Task>(&conn, c.id).unwrap().unwrap().status, TaskStatus::Blocked);
    }

    #[test]
    fn test_remove_edge_unblocks() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let b = store.create_task(1, &NewTask::titled("B")).unwrap();
        let conn = store.open().unwrap();

        add_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap();
        let updated = remove_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap();
        assert_eq!(updated.status, TaskStatus::Pending);
    }

    #[test]
    fn test_remove_missing_edge_is_not_found() {
        let (_dir, store) = create_test_store();
        let a = store.create_task(1, &NewTask::titled("A")).unwrap();
        let b = store.create_task(1, &NewTask::titled("B")).unwrap();
        let conn = store.open().unwrap();

        let err = remove_edge::<Task>(&conn, 1, b.id, a.id, now()).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "dependency", .. }));
    }

    #[test]
    fn test_project_edges_use_on_hold() {
        let (_dir, store) = create_test_store();
        let a = store.create_project(1, &NewProject::named("Research")).unwrap();
        let b = store.create_project(1, &NewProject::named("Build")).unwrap();
        let conn = store.open().unwrap();

        let updated = add_edge::<Project>(&conn, 1, b.id, a.id, now()).unwrap();
        assert_eq!(updated.status, ProjectStatus::OnHold);
        assert!(dependencies_of::<Task>(&conn, 1, b.id).is_err());
    }

    #[test]
    fn test_dependencies_are_sorted() {
        let (_dir, store) = create_test_store();
        let ids: Vec<i64> =
            (0..4).map(|i| store.create_task(1, &NewTask::titled(format!("T{i}"))).unwrap().id).collect();
        let conn = store.open().unwrap();

        add_edge::<Task>(&conn, 1, ids[0], ids[3], now()).unwrap();
        add_edge::<Task>(&conn, 1, ids[0], ids[1], now()).unwrap();
        add_edge::<Task>(&conn, 1, ids[0], ids[2], now()).unwrap();
        assert_eq!(dependencies_of::<Task>(&conn, 1, ids[0]).unwrap(), vec![ids[1], ids[2], ids[3]]);
    }
}
