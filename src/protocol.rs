//! IPC protocol types for daemon communication.
//!
//! One JSON object per line in each direction, tagged by `type`.

use crate::engine::{Ack, EngineError};
use crate::types::{GraphSnapshot, Status, Task, ValidationError};
use serde::{Deserialize, Serialize};

/// Request sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Create a new task.
    CreateTask {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default = "default_status")]
        status: Status,
    },

    /// Get a task by ID.
    GetTask { id: String },

    /// List tasks with optional status filter.
    ListTasks { status: Option<Status> },

    /// Make `task_id` depend on `depends_on_id`.
    ///
    /// Left optional on the wire so a missing prerequisite is reported as an
    /// invalid argument rather than a parse failure.
    AddDependency {
        task_id: String,
        #[serde(default)]
        depends_on_id: Option<String>,
    },

    /// Drop a dependency edge.
    RemoveDependency { task_id: String, depends_on_id: String },

    /// Set a task's status by name.
    SetStatus { id: String, status: String },

    /// Re-run the resolver on one task.
    Resolve { id: String },

    /// Snapshot of every task and edge.
    Graph,

    /// Shutdown the daemon.
    Shutdown,

    /// Ping to check if daemon is alive.
    Ping,
}

fn default_status() -> Status {
    Status::Pending
}

/// Response sent from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Single task response.
    Task { task: Task },

    /// Multiple tasks response.
    Tasks { tasks: Vec<Task> },

    /// Mutation accepted; lists the status changes it caused.
    Ack { ack: Ack },

    /// Status after resolution.
    Status { status: Status },

    /// Whole-graph snapshot.
    Graph { graph: GraphSnapshot },

    /// Task not found.
    NotFound { id: String },

    /// Operation succeeded.
    Ok,

    /// Pong response to ping.
    Pong,

    /// Error response.
    ///
    /// `kind` is `EngineError::kind()` (or `bad_request`); `detail` holds the
    /// variant's payload so the client can rebuild the same error.
    Error {
        kind: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl Response {
    /// Create an error response.
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            kind: kind.into(),
            message: message.into(),
            detail: None,
        }
    }
}

impl From<EngineError> for Response {
    fn from(e: EngineError) -> Self {
        let detail = match &e {
            EngineError::NotFound(id) => return Response::NotFound { id: id.clone() },
            EngineError::InvalidArgument(msg) => Some(msg.clone()),
            EngineError::InvalidStatus(status) => Some(status.clone()),
            EngineError::Validation(v) => Some(v.code().to_string()),
            EngineError::Storage(report) => Some(format!("{:#}", report)),
            EngineError::SelfDependency | EngineError::CycleDetected => None,
        };
        Response::Error {
            kind: e.kind().to_string(),
            message: e.to_string(),
            detail,
        }
    }
}

/// Rebuild the engine error an `Error` response was made from.
///
/// Storage failures and anything unrecognised come back as
/// `EngineError::Storage` carrying the daemon's message.
pub fn engine_error(kind: &str, message: String, detail: Option<String>) -> EngineError {
    match (kind, detail) {
        ("not_found", Some(id)) => EngineError::NotFound(id),
        ("invalid_argument", Some(msg)) => EngineError::InvalidArgument(msg),
        ("self_dependency", _) => EngineError::SelfDependency,
        ("cycle_detected", _) => EngineError::CycleDetected,
        ("invalid_status", Some(status)) => EngineError::InvalidStatus(status),
        ("validation", Some(code)) => match ValidationError::from_code(&code) {
            Some(v) => EngineError::Validation(v),
            None => EngineError::Storage(eyre::eyre!(message)),
        },
        ("storage", Some(cause)) => EngineError::Storage(eyre::eyre!(cause)),
        _ => EngineError::Storage(eyre::eyre!(message)),
    }
}
