//! Client for connecting to the taskdag daemon.

use crate::daemon::DaemonConfig;
use crate::engine::{Ack, EngineError};
use crate::protocol::{Request, Response, engine_error};
use crate::types::{GraphSnapshot, Status, Task};
use eyre::{Context, Result, bail};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client for communicating with the taskdag daemon.
///
/// Engine failures reported by the daemon come back as an `EngineError`
/// inside the `eyre::Report`, so callers can `downcast_ref` and match on it.
pub struct Client {
    root: PathBuf,
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl Client {
    /// Connect to a running daemon.
    pub fn connect(root: &Path) -> Result<Self> {
        let socket_path = DaemonConfig::new(root).socket_path();

        let stream = match UnixStream::connect(&socket_path) {
            Ok(stream) => stream,
            Err(e) => bail!("Failed to connect to daemon: {}. Is it running?", e),
        };

        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .context("Failed to set read timeout")?;
        let writer = stream.try_clone().context("Failed to clone daemon stream")?;

        Ok(Self {
            root: root.to_path_buf(),
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Get the store root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Send a request and receive a response.
    fn request(&mut self, request: Request) -> Result<Response> {
        let request_json = serde_json::to_string(&request)?;
        writeln!(self.writer, "{}", request_json)?;
        self.writer.flush()?;

        let mut response_line = String::new();
        if self.reader.read_line(&mut response_line)? == 0 {
            bail!("Daemon closed the connection");
        }

        let response: Response = serde_json::from_str(&response_line).context("Failed to parse daemon response")?;
        Ok(response)
    }

    /// Create a new task.
    pub fn create_task(&mut self, title: &str, description: Option<&str>, status: Status) -> Result<Task> {
        let response = self.request(Request::CreateTask {
            title: title.to_string(),
            description: description.map(String::from),
            status,
        })?;

        match response {
            Response::Task { task } => Ok(task),
            other => unexpected(other),
        }
    }

    /// Get a task by ID.
    pub fn get_task(&mut self, id: &str) -> Result<Option<Task>> {
        let response = self.request(Request::GetTask { id: id.to_string() })?;

        match response {
            Response::Task { task } => Ok(Some(task)),
            Response::NotFound { .. } => Ok(None),
            other => unexpected(other),
        }
    }

    /// List tasks with optional status filter.
    pub fn list_tasks(&mut self, status: Option<Status>) -> Result<Vec<Task>> {
        match self.request(Request::ListTasks { status })? {
            Response::Tasks { tasks } => Ok(tasks),
            other => unexpected(other),
        }
    }

    /// Make `task_id` depend on `depends_on_id`.
    pub fn add_dependency(&mut self, task_id: &str, depends_on_id: &str) -> Result<Ack> {
        let response = self.request(Request::AddDependency {
            task_id: task_id.to_string(),
            depends_on_id: Some(depends_on_id.to_string()),
        })?;

        match response {
            Response::Ack { ack } => Ok(ack),
            other => unexpected(other),
        }
    }

    /// Remove a dependency edge.
    pub fn remove_dependency(&mut self, task_id: &str, depends_on_id: &str) -> Result<Ack> {
        let response = self.request(Request::RemoveDependency {
            task_id: task_id.to_string(),
            depends_on_id: depends_on_id.to_string(),
        })?;

        match response {
            Response::Ack { ack } => Ok(ack),
            other => unexpected(other),
        }
    }

    /// Set a task's status by name.
    pub fn set_status(&mut self, id: &str, status: &str) -> Result<Ack> {
        let response = self.request(Request::SetStatus {
            id: id.to_string(),
            status: status.to_string(),
        })?;

        match response {
            Response::Ack { ack } => Ok(ack),
            other => unexpected(other),
        }
    }

    /// Re-run the resolver on a task.
    pub fn resolve(&mut self, id: &str) -> Result<Status> {
        match self.request(Request::Resolve { id: id.to_string() })? {
            Response::Status { status } => Ok(status),
            other => unexpected(other),
        }
    }

    /// Fetch the whole graph.
    pub fn graph(&mut self) -> Result<GraphSnapshot> {
        match self.request(Request::Graph)? {
            Response::Graph { graph } => Ok(graph),
            other => unexpected(other),
        }
    }

    /// Shutdown the daemon.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.request(Request::Shutdown)? {
            Response::Ok => Ok(()),
            other => unexpected(other),
        }
    }

    /// Ping the daemon.
    pub fn ping(&mut self) -> Result<()> {
        match self.request(Request::Ping)? {
            Response::Pong => Ok(()),
            other => unexpected(other),
        }
    }
}

fn unexpected<T>(response: Response) -> Result<T> {
    match response {
        Response::Error { kind, message, detail } => Err(engine_error(&kind, message, detail).into()),
        Response::NotFound { id } => Err(EngineError::NotFound(id).into()),
        other => bail!("Unexpected response: {:?}", other),
    }
}
