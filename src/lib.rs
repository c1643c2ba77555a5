//! taskdag: a task dependency graph that stays acyclic and keeps statuses in
//! step with dependencies.
//!
//! Tasks live in a [`GraphStore`]. The [`Engine`] validates new dependency
//! edges (no self-loops, no cycles) and recomputes statuses when edges or
//! prerequisite statuses change.
//!
//! # Example
//!
//! ```
//! use taskdag::{Engine, MemoryStore, Status};
//!
//! let mut engine = Engine::new(MemoryStore::new());
//!
//! let tests = engine.create_task("Write tests", None, Status::Pending).unwrap();
//! let login = engine.create_task("Implement login", None, Status::Pending).unwrap();
//!
//! // Tests depend on login
//! engine.add_dependency(&tests.id, &login.id).unwrap();
//!
//! // The reverse edge would close a cycle
//! assert!(engine.add_dependency(&login.id, &tests.id).is_err());
//!
//! // Finishing login moves its direct dependents along
//! engine.set_status(&login.id, Status::Completed).unwrap();
//! let tests = engine.get_task(&tests.id).unwrap().unwrap();
//! assert_eq!(tests.status, Status::InProgress);
//! ```

mod cascade;
mod cycle;
mod engine;
mod graph;
mod id;
mod memory;
mod resolve;
mod storage;
mod types;

pub mod client;
pub mod daemon;
pub mod protocol;

// Re-export public API
pub use cascade::CascadeMode;
pub use client::Client;
pub use cycle::would_create_cycle;
pub use daemon::{Daemon, DaemonConfig, is_daemon_running};
pub use engine::{Ack, Engine, EngineConfig, EngineError};
pub use graph::GraphStore;
pub use memory::MemoryStore;
pub use protocol::{Request, Response};
pub use resolve::{derive_status, resolve_status};
pub use storage::SqliteStore;
pub use types::{Dependency, GraphEdge, GraphNode, GraphSnapshot, Status, StatusChange, Task, ValidationError};
