//! The store capability the engine reads and writes through.

use crate::types::{Dependency, Status, Task};
use eyre::Result;

/// Holds tasks and dependency edges.
///
/// The store exclusively owns the records. The engine keeps no state of its
/// own between calls; everything it knows it reads through this trait.
pub trait GraphStore {
    /// Look up a task by id.
    fn get_task(&self, id: &str) -> Result<Option<Task>>;

    /// All tasks, oldest first, optionally filtered by status.
    fn list_tasks(&self, status_filter: Option<Status>) -> Result<Vec<Task>>;

    /// Persist a new task.
    fn insert_task(&mut self, task: &Task) -> Result<()>;

    /// Overwrite a task's status and bump its `updated_at`.
    fn save_task_status(&mut self, task_id: &str, status: Status) -> Result<()>;

    /// Edges where `task_id` is the dependent, in insertion order.
    fn list_dependencies(&self, task_id: &str) -> Result<Vec<Dependency>>;

    /// Edges where `task_id` is the prerequisite, in insertion order.
    fn list_dependents(&self, task_id: &str) -> Result<Vec<Dependency>>;

    /// Every edge in the graph, in insertion order.
    fn list_edges(&self) -> Result<Vec<Dependency>>;

    /// Record that `task_id` depends on `depends_on_id`.
    ///
    /// Returns false when the edge was already present; no second copy is
    /// stored.
    fn create_edge(&mut self, task_id: &str, depends_on_id: &str) -> Result<bool>;

    /// Drop an edge. Returns false when there was nothing to remove.
    fn remove_edge(&mut self, task_id: &str, depends_on_id: &str) -> Result<bool>;

    /// Run `f` as one logical transaction.
    ///
    /// Everything `f` reads and writes must be isolated from concurrent
    /// writers, and an `Err` from `f` must leave the store as it was. The
    /// default suits stores that are only reachable through `&mut self`.
    fn atomically<T, E>(&mut self, f: impl FnOnce(&mut Self) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        Self: Sized,
        E: From<eyre::Report>,
    {
        f(self)
    }
}
