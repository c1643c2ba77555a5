//! In-process graph store.

use crate::graph::GraphStore;
use crate::types::{Dependency, Status, Task};
use chrono::Utc;
use eyre::{Result, bail};
use std::collections::HashMap;

/// A `GraphStore` kept entirely in memory.
///
/// Tasks and edges keep their insertion order, matching what `SqliteStore`
/// returns, so the two are interchangeable under the engine. Edges are also
/// indexed both ways so neighbour lookups cost the node's degree, not |E|.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    edges: Vec<Dependency>,
    /// task_id -> edges where it is the dependent
    forward: HashMap<String, Vec<Dependency>>,
    /// depends_on_id -> edges where it is the prerequisite
    reverse: HashMap<String, Vec<Dependency>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edges currently stored.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        let idx = *self.index.get(id)?;
        self.tasks.get_mut(idx)
    }
}

impl GraphStore for MemoryStore {
    fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.index.get(id).map(|&idx| self.tasks[idx].clone()))
    }

    fn list_tasks(&self, status_filter: Option<Status>) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .iter()
            .filter(|t| status_filter.is_none_or(|s| t.status == s))
            .cloned()
            .collect())
    }

    fn insert_task(&mut self, task: &Task) -> Result<()> {
        if self.index.contains_key(&task.id) {
            bail!("task {} already exists", task.id);
        }
        self.index.insert(task.id.clone(), self.tasks.len());
        self.tasks.push(task.clone());
        Ok(())
    }

    fn save_task_status(&mut self, task_id: &str, status: Status) -> Result<()> {
        let Some(task) = self.task_mut(task_id) else {
            bail!("task {} does not exist", task_id);
        };
        task.status = status;
        task.updated_at = Utc::now();
        Ok(())
    }

    fn list_dependencies(&self, task_id: &str) -> Result<Vec<Dependency>> {
        Ok(self.forward.get(task_id).cloned().unwrap_or_default())
    }

    fn list_dependents(&self, task_id: &str) -> Result<Vec<Dependency>> {
        Ok(self.reverse.get(task_id).cloned().unwrap_or_default())
    }

    fn list_edges(&self) -> Result<Vec<Dependency>> {
        Ok(self.edges.clone())
    }

    fn create_edge(&mut self, task_id: &str, depends_on_id: &str) -> Result<bool> {
        for id in [task_id, depends_on_id] {
            if !self.index.contains_key(id) {
                bail!("edge endpoint {} does not exist", id);
            }
        }
        if self
            .forward
            .get(task_id)
            .is_some_and(|deps| deps.iter().any(|e| e.depends_on_id == depends_on_id))
        {
            return Ok(false);
        }

        let edge = Dependency {
            task_id: task_id.to_string(),
            depends_on_id: depends_on_id.to_string(),
            created_at: Utc::now(),
        };
        self.forward.entry(edge.task_id.clone()).or_default().push(edge.clone());
        self.reverse
            .entry(edge.depends_on_id.clone())
            .or_default()
            .push(edge.clone());
        self.edges.push(edge);
        Ok(true)
    }

    fn remove_edge(&mut self, task_id: &str, depends_on_id: &str) -> Result<bool> {
        let Some(deps) = self.forward.get_mut(task_id) else {
            return Ok(false);
        };
        let before = deps.len();
        deps.retain(|e| e.depends_on_id != depends_on_id);
        if deps.len() == before {
            return Ok(false);
        }

        if let Some(dependents) = self.reverse.get_mut(depends_on_id) {
            dependents.retain(|e| e.task_id != task_id);
        }
        self.edges
            .retain(|e| !(e.task_id == task_id && e.depends_on_id == depends_on_id));
        Ok(true)
    }
}
