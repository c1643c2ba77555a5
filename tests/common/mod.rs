//! Shared test infrastructure for taskdag integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use taskdag::{Ack, CascadeMode, Engine, EngineConfig, GraphStore, SqliteStore, Status, Task};
use tempfile::TempDir;

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub engine: Engine<SqliteStore>,
}

impl TestEnv {
    /// Create a new test environment with an initialized on-disk store.
    pub fn new() -> Self {
        Self::with_cascade(CascadeMode::Direct)
    }

    /// Same as `new`, with a specific cascade mode.
    pub fn with_cascade(cascade: CascadeMode) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteStore::init(temp_dir.path()).expect("Failed to init store");
        let engine = Engine::with_config(store, EngineConfig { cascade });
        Self { temp_dir, engine }
    }

    /// Create a pending task.
    pub fn create_task(&mut self, title: &str) -> Task {
        self.create_task_with_status(title, Status::Pending)
    }

    /// Create a task with a specific initial status.
    pub fn create_task_with_status(&mut self, title: &str, status: Status) -> Task {
        self.engine
            .create_task(title, None, status)
            .expect("Failed to create task")
    }

    /// Make `task` depend on `prerequisite`.
    pub fn depend(&mut self, task: &Task, prerequisite: &Task) -> Ack {
        self.engine
            .add_dependency(&task.id, &prerequisite.id)
            .expect("Failed to add dependency")
    }

    /// Manually set a task's status.
    pub fn set_status(&mut self, task: &Task, status: Status) -> Ack {
        self.engine
            .set_status(&task.id, status)
            .expect("Failed to set status")
    }

    /// Current stored status of a task.
    pub fn status(&self, task: &Task) -> Status {
        self.engine
            .get_task(&task.id)
            .expect("Failed to get task")
            .expect("Task disappeared")
            .status
    }

    /// Assert a task's stored status.
    pub fn assert_status(&self, task: &Task, expected: Status) {
        let actual = self.status(task);
        assert_eq!(
            actual, expected,
            "Expected task {} ({}) to be {}, but it was {}",
            task.id, task.title, expected, actual
        );
    }

    /// Number of stored edges.
    pub fn edge_count(&self) -> usize {
        self.engine.store().list_edges().expect("Failed to list edges").len()
    }

    /// Get tasks count.
    pub fn total_count(&self) -> usize {
        self.engine.list_tasks(None).expect("Failed to list tasks").len()
    }

    /// Get tasks by status.
    pub fn count_by_status(&self, status: Status) -> usize {
        self.engine
            .list_tasks(Some(status))
            .expect("Failed to list tasks")
            .len()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
