//! CLI argument parsing for taskdag.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskdag::CascadeMode;

#[derive(Parser)]
#[command(
    name = "td",
    about = "Task dependency graph with cycle checks and status propagation",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/taskdag/logs/taskdag.log"
)]
pub struct Cli {
    /// Path to the taskdag store directory (default: current directory)
    #[arg(short = 'd', long, global = true, env = "TASKDAG_DIR")]
    pub dir: Option<PathBuf>,

    /// How far a status change propagates (direct, transitive)
    #[arg(long, global = true, env = "TASKDAG_CASCADE", default_value = "direct")]
    pub cascade: CascadeMode,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new taskdag store in the current directory
    Init,

    /// Create a new task
    Create {
        /// Task title
        title: String,

        /// Longer description
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// Initial status (pending, in_progress, completed, blocked)
        #[arg(short, long, default_value = "pending")]
        status: String,
    },

    /// List tasks
    List {
        /// Filter by status (pending, in_progress, completed, blocked)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Get a task by ID, with its dependencies and dependents
    Get {
        /// Task ID
        id: String,
    },

    /// Make a task depend on another
    Depend {
        /// Task that gains the dependency
        task_id: String,

        /// Task it depends on (must finish first)
        depends_on_id: String,
    },

    /// Remove a dependency
    Undepend {
        /// Dependent task
        task_id: String,

        /// Prerequisite task
        depends_on_id: String,
    },

    /// Set a task's status and re-resolve its dependents
    Status {
        /// Task ID
        id: String,

        /// New status (pending, in_progress, completed, blocked)
        status: String,
    },

    /// Recompute a task's status from its dependencies
    Resolve {
        /// Task ID
        id: String,
    },

    /// Print every task and dependency
    Graph {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run the daemon in foreground
    Daemon,

    /// Stop the running daemon
    DaemonStop,

    /// Check daemon status
    DaemonStatus,
}
