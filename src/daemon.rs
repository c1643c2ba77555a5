//! Background daemon serving the graph engine over a Unix socket.
//!
//! Every connection forwards its requests into one queue, and a single loop
//! applies them to the engine in arrival order. Mutations from concurrent
//! clients are therefore serialized before they reach the store.

use crate::cascade::CascadeMode;
use crate::engine::{Engine, EngineConfig};
use crate::protocol::{Request, Response};
use crate::storage::{SqliteStore, TASKDAG_DIR};
use eyre::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

/// Socket file name within the .taskdag directory.
const SOCKET_FILE: &str = "daemon.sock";

/// PID file name within the .taskdag directory.
const PID_FILE: &str = "daemon.pid";

/// How often idle loops re-check the shutdown flag.
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Requests that may wait for the engine before senders block.
const DEFAULT_QUEUE_DEPTH: usize = 100;

type Envelope = (Request, oneshot::Sender<Response>);

/// Configuration for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root directory containing .taskdag
    pub root: PathBuf,

    /// Cascade mode handed to the engine
    pub cascade: CascadeMode,

    /// Shutdown poll interval
    pub poll_interval: Duration,

    /// Capacity of the request queue
    pub queue_depth: usize,
}

impl DaemonConfig {
    /// Create config with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cascade: CascadeMode::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    /// Set the cascade mode.
    pub fn cascade(mut self, cascade: CascadeMode) -> Self {
        self.cascade = cascade;
        self
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.root.join(TASKDAG_DIR).join(SOCKET_FILE)
    }

    /// Get the PID file path.
    pub fn pid_path(&self) -> PathBuf {
        self.root.join(TASKDAG_DIR).join(PID_FILE)
    }
}

/// The taskdag daemon.
pub struct Daemon {
    config: DaemonConfig,
    engine: Engine<SqliteStore>,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    /// Create a new daemon instance.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.root).context("Failed to open store")?;
        let engine = Engine::with_config(store, EngineConfig { cascade: config.cascade });

        Ok(Self {
            config,
            engine,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get a shutdown handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the daemon until a shutdown is requested.
    pub async fn run(&mut self) -> Result<()> {
        // Clean up any stale socket
        let socket_path = self.config.socket_path();
        if socket_path.exists() {
            fs::remove_file(&socket_path).ok();
        }

        let pid_path = self.config.pid_path();
        fs::write(&pid_path, std::process::id().to_string()).context("Failed to write PID file")?;

        let listener = UnixListener::bind(&socket_path).context("Failed to bind to Unix socket")?;
        log::info!(
            "Daemon listening on {:?} (cascade: {})",
            socket_path,
            self.config.cascade
        );

        let (tx, mut rx) = mpsc::channel::<Envelope>(self.config.queue_depth);

        tokio::spawn(Self::accept_connections(
            listener,
            tx,
            Arc::clone(&self.shutdown),
            self.config.poll_interval,
        ));

        let mut ticker = interval(self.config.poll_interval);

        loop {
            tokio::select! {
                Some((request, response_tx)) = rx.recv() => {
                    let response = self.handle_request(request);
                    let _ = response_tx.send(response);
                }

                _ = ticker.tick() => {}
            }

            if self.shutdown.load(Ordering::Relaxed) {
                log::info!("Daemon shutting down");
                break;
            }
        }

        fs::remove_file(&socket_path).ok();
        fs::remove_file(&pid_path).ok();

        Ok(())
    }

    /// Accept connections until shutdown.
    async fn accept_connections(
        listener: UnixListener,
        tx: mpsc::Sender<Envelope>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        while !shutdown.load(Ordering::Relaxed) {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let tx = tx.clone();
                        let shutdown = Arc::clone(&shutdown);
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_connection(stream, tx, shutdown).await {
                                log::warn!("Connection error: {:#}", e);
                            }
                        });
                    }
                    Err(e) => {
                        log::error!("Accept error: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },

                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    /// Handle a single client connection.
    async fn handle_connection(stream: UnixStream, tx: mpsc::Sender<Envelope>, shutdown: Arc<AtomicBool>) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await.context("Failed to read line")? {
            if line.trim().is_empty() {
                continue;
            }

            let (response, is_shutdown) = match serde_json::from_str::<Request>(&line) {
                Ok(request) => {
                    let is_shutdown = matches!(request, Request::Shutdown);
                    let (resp_tx, resp_rx) = oneshot::channel();
                    tx.send((request, resp_tx))
                        .await
                        .context("Failed to send request to daemon")?;
                    let response = resp_rx.await.context("Daemon dropped the request")?;
                    (response, is_shutdown)
                }
                Err(e) => (Response::error("bad_request", format!("Failed to parse request: {}", e)), false),
            };

            let mut response_json = serde_json::to_string(&response)?;
            response_json.push('\n');
            writer.write_all(response_json.as_bytes()).await?;
            writer.flush().await?;

            if is_shutdown {
                // Only after the client has its answer
                shutdown.store(true, Ordering::Relaxed);
                break;
            }
        }

        Ok(())
    }

    /// Handle a single request.
    fn handle_request(&mut self, request: Request) -> Response {
        log::debug!("Request: {:?}", request);

        match request {
            Request::CreateTask {
                title,
                description,
                status,
            } => match self.engine.create_task(&title, description.as_deref(), status) {
                Ok(task) => Response::Task { task },
                Err(e) => e.into(),
            },

            Request::GetTask { id } => match self.engine.get_task(&id) {
                Ok(Some(task)) => Response::Task { task },
                Ok(None) => Response::NotFound { id },
                Err(e) => e.into(),
            },

            Request::ListTasks { status } => match self.engine.list_tasks(status) {
                Ok(tasks) => Response::Tasks { tasks },
                Err(e) => e.into(),
            },

            Request::AddDependency { task_id, depends_on_id } => {
                match self
                    .engine
                    .add_dependency(&task_id, depends_on_id.as_deref().unwrap_or_default())
                {
                    Ok(ack) => Response::Ack { ack },
                    Err(e) => e.into(),
                }
            }

            Request::RemoveDependency { task_id, depends_on_id } => {
                match self.engine.remove_dependency(&task_id, &depends_on_id) {
                    Ok(ack) => Response::Ack { ack },
                    Err(e) => e.into(),
                }
            }

            Request::SetStatus { id, status } => match self.engine.set_status_named(&id, &status) {
                Ok(ack) => Response::Ack { ack },
                Err(e) => e.into(),
            },

            Request::Resolve { id } => match self.engine.resolve(&id) {
                Ok(status) => Response::Status { status },
                Err(e) => e.into(),
            },

            Request::Graph => match self.engine.graph() {
                Ok(graph) => Response::Graph { graph },
                Err(e) => e.into(),
            },

            // The connection raises the flag once the reply is written
            Request::Shutdown => Response::Ok,

            Request::Ping => Response::Pong,
        }
    }
}

/// Check if a daemon is running for the given store path.
pub fn is_daemon_running(root: &Path) -> bool {
    let config = DaemonConfig::new(root);
    let socket_path = config.socket_path();
    let pid_path = config.pid_path();

    if !socket_path.exists() {
        return false;
    }

    if let Ok(pid_str) = fs::read_to_string(&pid_path)
        && let Ok(pid) = pid_str.trim().parse::<i32>()
    {
        // Signal 0 only checks that the process exists
        unsafe {
            if libc::kill(pid, 0) == 0 {
                return true;
            }
        }
    }

    // Stale socket, clean up
    fs::remove_file(&socket_path).ok();
    fs::remove_file(&pid_path).ok();
    false
}
