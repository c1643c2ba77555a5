//! Propagation engine: validated edge insertion and status cascades.

use crate::cascade::{CascadeMode, cascade_order};
use crate::cycle::would_create_cycle;
use crate::graph::GraphStore;
use crate::id::generate_id;
use crate::resolve::resolve_status;
use crate::types::{Dependency, GraphEdge, GraphNode, GraphSnapshot, Status, StatusChange, Task, ValidationError};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Errors that can occur during engine operations.
#[derive(Debug)]
pub enum EngineError {
    /// Task not found.
    NotFound(String),
    /// A required argument was missing.
    InvalidArgument(String),
    /// A task was asked to depend on itself.
    SelfDependency,
    /// Adding this edge would create a cycle.
    CycleDetected,
    /// Status name outside the recognised set.
    InvalidStatus(String),
    /// Task failed validation.
    Validation(ValidationError),
    /// The store failed underneath us.
    Storage(eyre::Report),
}

impl EngineError {
    /// Stable machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::SelfDependency => "self_dependency",
            EngineError::CycleDetected => "cycle_detected",
            EngineError::InvalidStatus(_) => "invalid_status",
            EngineError::Validation(_) => "validation",
            EngineError::Storage(_) => "storage",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "task not found: {}", id),
            EngineError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            EngineError::SelfDependency => write!(f, "task cannot depend on itself"),
            EngineError::CycleDetected => write!(f, "adding this dependency would create a cycle"),
            EngineError::InvalidStatus(status) => write!(f, "invalid status: {}", status),
            EngineError::Validation(e) => write!(f, "validation error: {}", e),
            EngineError::Storage(e) => write!(f, "storage error: {:#}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<eyre::Report> for EngineError {
    fn from(e: eyre::Report) -> Self {
        EngineError::Storage(e)
    }
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Engine behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// How far `set_status` propagates.
    pub cascade: CascadeMode,
}

/// Acknowledgement of a successful mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Every status that moved, in the order it was written.
    pub changes: Vec<StatusChange>,
}

impl Ack {
    /// The status `task_id` ended up with, if this operation changed it.
    pub fn status_of(&self, task_id: &str) -> Option<Status> {
        self.changes.iter().rev().find(|c| c.task_id == task_id).map(|c| c.to)
    }

    fn record(&mut self, change: Option<StatusChange>) {
        self.changes.extend(change);
    }
}

/// The dependency graph engine.
///
/// Holds the store handle it was built with and nothing else; every call
/// reads fresh state and runs as a single store transaction.
pub struct Engine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: GraphStore> Engine<S> {
    /// Build an engine with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Create a new task with the given initial status.
    pub fn create_task(&mut self, title: &str, description: Option<&str>, status: Status) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: generate_id(title, now),
            title: title.to_string(),
            description: description.map(String::from),
            status,
            created_at: now,
            updated_at: now,
        };

        // Validate before persisting
        task.validate()?;

        self.store.atomically(|store| store.insert_task(&task))?;
        log::info!("Created task {} ({})", task.id, task.status);

        Ok(task)
    }

    /// Get a task by ID.
    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.store.get_task(id)?)
    }

    /// List tasks with optional status filter.
    pub fn list_tasks(&self, status_filter: Option<Status>) -> Result<Vec<Task>> {
        Ok(self.store.list_tasks(status_filter)?)
    }

    /// Edges where `task_id` is the dependent.
    pub fn dependencies_of(&self, task_id: &str) -> Result<Vec<Dependency>> {
        require_task(&self.store, task_id)?;
        Ok(self.store.list_dependencies(task_id)?)
    }

    /// Edges where `task_id` is the prerequisite.
    pub fn dependents_of(&self, task_id: &str) -> Result<Vec<Dependency>> {
        require_task(&self.store, task_id)?;
        Ok(self.store.list_dependents(task_id)?)
    }

    /// Declare that `task_id` depends on `depends_on_id`.
    ///
    /// Every check runs before anything is written. On success only
    /// `task_id` is re-resolved. Re-adding an existing edge passes
    /// validation and leaves a single copy in the store.
    pub fn add_dependency(&mut self, task_id: &str, depends_on_id: &str) -> Result<Ack> {
        self.store.atomically(|store| {
            let task = require_task(store, task_id)?;

            let depends_on_id = depends_on_id.trim();
            if depends_on_id.is_empty() {
                return Err(EngineError::InvalidArgument("depends_on_id is required".to_string()));
            }
            if task.id == depends_on_id {
                return Err(EngineError::SelfDependency);
            }
            require_task(store, depends_on_id)?;

            if would_create_cycle(store, &task.id, depends_on_id)? {
                log::debug!("Rejected {} -> {}: would create a cycle", task.id, depends_on_id);
                return Err(EngineError::CycleDetected);
            }

            if !store.create_edge(&task.id, depends_on_id)? {
                log::debug!("Dependency {} -> {} already present", task.id, depends_on_id);
            }

            let mut ack = Ack::default();
            ack.record(resolve_status(store, &task)?);
            log::info!("Added dependency {} -> {}", task.id, depends_on_id);
            Ok(ack)
        })
    }

    /// Drop the edge `task_id -> depends_on_id`, then re-resolve `task_id`.
    ///
    /// Removing an edge that does not exist is a no-op. A task left with no
    /// dependencies keeps its current status.
    pub fn remove_dependency(&mut self, task_id: &str, depends_on_id: &str) -> Result<Ack> {
        self.store.atomically(|store| {
            let task = require_task(store, task_id)?;

            let mut ack = Ack::default();
            if store.remove_edge(&task.id, depends_on_id)? {
                ack.record(resolve_status(store, &task)?);
                log::info!("Removed dependency {} -> {}", task.id, depends_on_id);
            }
            Ok(ack)
        })
    }

    /// Manually set a task's status, then re-resolve its dependents.
    ///
    /// The new status is written as given even when the task has
    /// dependencies of its own. Which dependents are re-resolved depends on
    /// the configured `CascadeMode`.
    pub fn set_status(&mut self, task_id: &str, status: Status) -> Result<Ack> {
        let cascade = self.config.cascade;
        self.store.atomically(|store| {
            let task = require_task(store, task_id)?;
            apply_status(store, task, status, cascade)
        })
    }

    /// `set_status` for a status name that has not been parsed yet.
    ///
    /// The task is looked up first, so a missing task reports `NotFound`
    /// even when the name is also bad.
    pub fn set_status_named(&mut self, task_id: &str, status: &str) -> Result<Ack> {
        let cascade = self.config.cascade;
        self.store.atomically(|store| {
            let task = require_task(store, task_id)?;
            let status: Status = status.parse()?;
            apply_status(store, task, status, cascade)
        })
    }

    /// Run the resolver on one task and return the status it ends up with.
    pub fn resolve(&mut self, task_id: &str) -> Result<Status> {
        self.store.atomically(|store| {
            let task = require_task(store, task_id)?;
            Ok(match resolve_status(store, &task)? {
                Some(change) => change.to,
                None => task.status,
            })
        })
    }

    /// Every task and edge, as stored.
    pub fn graph(&self) -> Result<GraphSnapshot> {
        let tasks = self
            .store
            .list_tasks(None)?
            .into_iter()
            .map(|t| GraphNode {
                id: t.id,
                title: t.title,
                status: t.status,
            })
            .collect();
        let dependencies = self
            .store
            .list_edges()?
            .into_iter()
            .map(|e| GraphEdge {
                from: e.task_id,
                to: e.depends_on_id,
            })
            .collect();

        Ok(GraphSnapshot { tasks, dependencies })
    }
}

fn require_task<S: GraphStore>(store: &S, id: &str) -> Result<Task> {
    store
        .get_task(id)?
        .ok_or_else(|| EngineError::NotFound(id.to_string()))
}

fn apply_status<S: GraphStore>(store: &mut S, task: Task, status: Status, cascade: CascadeMode) -> Result<Ack> {
    let mut ack = Ack::default();

    store.save_task_status(&task.id, status)?;
    if task.status != status {
        ack.changes.push(StatusChange {
            task_id: task.id.clone(),
            from: task.status,
            to: status,
        });
    }
    log::info!("Set {} to {}", task.id, status);

    for id in cascade_order(store, &task.id, cascade)? {
        let dependent = require_task(store, &id)?;
        ack.record(resolve_status(store, &dependent)?);
    }

    Ok(ack)
}
