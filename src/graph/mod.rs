//! Dependency graph over tasks and projects.
//!
//! Each node kind has its own edge table. The operations here are generic
//! over [`DependencyNode`] so tasks and projects share one implementation.

pub mod edges;
pub mod node;
pub mod propagate;

pub use node::{DependencyNode, NodeStatus};

use crate::error::Result;
use crate::store::SqliteStore;

impl SqliteStore {
    /// Make `node` depend on `depends_on`; returns `node` after recomputation.
    ///
    /// # Errors
    ///
    /// Returns `SelfDependency`, `NotFound` or `CircularDependency`; nothing
    /// is written on error.
    pub fn add_dependency<N: DependencyNode>(&self, owner_id: i64, node: i64, depends_on: i64) -> Result<N> {
        let now = self.now();
        self.write(|tx| edges::add_edge::<N>(tx, owner_id, node, depends_on, now))
    }

    /// Remove the dependency of `node` on `depends_on`; returns `node` after recomputation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if either node is not the owner's or the edge does not exist.
    pub fn remove_dependency<N: DependencyNode>(
        &self,
        owner_id: i64,
        node: i64,
        depends_on: i64,
    ) -> Result<N> {
        let now = self.now();
        self.write(|tx| edges::remove_edge::<N>(tx, owner_id, node, depends_on, now))
    }

    /// Ids `node` depends on, ascending.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the node is not the owner's.
    pub fn dependencies_of<N: DependencyNode>(&self, owner_id: i64, node: i64) -> Result<Vec<i64>> {
        let conn = self.open()?;
        edges::dependencies_of::<N>(&conn, owner_id, node)
    }

    /// Ids of the nodes depending on `node`, ascending.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the node is not the owner's.
    pub fn dependents_of<N: DependencyNode>(&self, owner_id: i64, node: i64) -> Result<Vec<i64>> {
        let conn = self.open()?;
        edges::dependents_of::<N>(&conn, owner_id, node)
    }

    /// Recompute one of the owner's nodes; `true` if it was released.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the node is not the owner's.
    pub fn recompute_status<N: DependencyNode>(&self, owner_id: i64, node: i64) -> Result<bool> {
        let now = self.now();
        self.write(|tx| {
            node::fetch_owned::<N>(tx, owner_id, node)?;
            propagate::recompute::<N>(tx, node, now)
        })
    }
}
