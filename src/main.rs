//! taskdag CLI - a task dependency graph with status propagation.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use taskdag::{
    Ack, Client, Daemon, DaemonConfig, Engine, EngineConfig, SqliteStore, Status, is_daemon_running,
};

mod cli;

use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskdag")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("taskdag.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn get_store_dir(cli: &Cli) -> PathBuf {
    cli.dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn open_engine(dir: &Path, config: EngineConfig) -> Result<Engine<SqliteStore>> {
    let store = SqliteStore::open(dir).context("Failed to open store")?;
    Ok(Engine::with_config(store, config))
}

fn format_status(status: &Status) -> ColoredString {
    match status {
        Status::Pending => "pending".yellow(),
        Status::InProgress => "in_progress".cyan(),
        Status::Completed => "completed".green(),
        Status::Blocked => "blocked".red(),
    }
}

fn print_changes(ack: &Ack) {
    for change in &ack.changes {
        println!(
            "  {} {} {} {}",
            change.task_id.cyan(),
            format_status(&change.from),
            "→".dimmed(),
            format_status(&change.to)
        );
    }
}

fn run(cli: Cli) -> Result<()> {
    let store_dir = get_store_dir(&cli);
    let config = EngineConfig { cascade: cli.cascade };

    match cli.command {
        Command::Init => {
            SqliteStore::init(&store_dir).context("Failed to initialize taskdag store")?;
            println!("{} Initialized taskdag store in {}", "✓".green(), store_dir.display());
        }

        Command::Create {
            title,
            description,
            status,
        } => {
            let mut engine = open_engine(&store_dir, config)?;
            let status: Status = status.parse()?;
            let task = engine
                .create_task(&title, description.as_deref(), status)
                .context("Failed to create task")?;

            println!("{} Created: {} {}", "✓".green(), task.id.cyan(), task.title);
        }

        Command::List { status } => {
            let engine = open_engine(&store_dir, config)?;
            let status_filter = status.as_deref().map(str::parse::<Status>).transpose()?;

            let tasks = engine.list_tasks(status_filter).context("Failed to list tasks")?;

            if tasks.is_empty() {
                println!("{}", "No tasks found".dimmed());
            } else {
                for task in tasks {
                    println!("{} {} {}", format_status(&task.status), task.id.cyan(), task.title);
                }
            }
        }

        Command::Get { id } => {
            let engine = open_engine(&store_dir, config)?;
            let Some(task) = engine.get_task(&id).context("Failed to get task")? else {
                eprintln!("{} Task not found: {}", "✗".red(), id);
                std::process::exit(1);
            };

            println!("{}: {}", "ID".bold(), task.id.cyan());
            println!("{}: {}", "Title".bold(), task.title);
            println!("{}: {}", "Status".bold(), format_status(&task.status));
            if let Some(desc) = &task.description {
                println!("{}: {}", "Description".bold(), desc);
            }
            println!("{}: {}", "Created".bold(), task.created_at);
            println!("{}: {}", "Updated".bold(), task.updated_at);

            let dependencies = engine.dependencies_of(&task.id)?;
            if !dependencies.is_empty() {
                println!("{}:", "Depends on".bold());
                for edge in dependencies {
                    println!("  {}", edge.depends_on_id.cyan());
                }
            }
            let dependents = engine.dependents_of(&task.id)?;
            if !dependents.is_empty() {
                println!("{}:", "Needed by".bold());
                for edge in dependents {
                    println!("  {}", edge.task_id.cyan());
                }
            }
        }

        Command::Depend { task_id, depends_on_id } => {
            let mut engine = open_engine(&store_dir, config)?;
            let ack = engine
                .add_dependency(&task_id, &depends_on_id)
                .context("Failed to add dependency")?;

            println!(
                "{} {} now depends on {}",
                "✓".green(),
                task_id.cyan(),
                depends_on_id.cyan()
            );
            print_changes(&ack);
        }

        Command::Undepend { task_id, depends_on_id } => {
            let mut engine = open_engine(&store_dir, config)?;
            let ack = engine
                .remove_dependency(&task_id, &depends_on_id)
                .context("Failed to remove dependency")?;

            println!(
                "{} {} no longer depends on {}",
                "✓".green(),
                task_id.cyan(),
                depends_on_id.cyan()
            );
            print_changes(&ack);
        }

        Command::Status { id, status } => {
            let mut engine = open_engine(&store_dir, config)?;
            let ack = engine
                .set_status_named(&id, &status)
                .context("Failed to update status")?;

            println!("{} Status updated: {}", "✓".green(), id.cyan());
            print_changes(&ack);
        }

        Command::Resolve { id } => {
            let mut engine = open_engine(&store_dir, config)?;
            let status = engine.resolve(&id).context("Failed to resolve status")?;

            println!("{} {}", id.cyan(), format_status(&status));
        }

        Command::Graph { json } => {
            let engine = open_engine(&store_dir, config)?;
            let graph = engine.graph().context("Failed to read graph")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&graph)?);
            } else if graph.tasks.is_empty() {
                println!("{}", "Empty graph".dimmed());
            } else {
                for task in &graph.tasks {
                    println!("{} {} {}", format_status(&task.status), task.id.cyan(), task.title);
                    for edge in graph.dependencies.iter().filter(|e| e.from == task.id) {
                        println!("    {} {}", "→".dimmed(), edge.to.cyan());
                    }
                }
            }
        }

        Command::Daemon => {
            println!("{} Starting daemon for {}", "→".blue(), store_dir.display());

            let daemon_config = DaemonConfig::new(&store_dir).cascade(cli.cascade);
            let mut daemon = Daemon::new(daemon_config).context("Failed to create daemon")?;

            let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
            rt.block_on(async { daemon.run().await }).context("Daemon error")?;
        }

        Command::DaemonStop => {
            if !is_daemon_running(&store_dir) {
                println!("{} Daemon is not running", "✗".red());
                std::process::exit(1);
            }

            let mut client = Client::connect(&store_dir).context("Failed to connect to daemon")?;
            client.shutdown().context("Failed to shutdown daemon")?;
            println!("{} Daemon stopped", "✓".green());
        }

        Command::DaemonStatus => {
            if is_daemon_running(&store_dir) {
                println!("{} Daemon is running", "✓".green());

                if let Ok(mut client) = Client::connect(&store_dir)
                    && client.ping().is_ok()
                {
                    println!("  {} Responding to requests", "✓".green());
                }
            } else {
                println!("{} Daemon is not running", "✗".red());
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
