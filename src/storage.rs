//! SQLite-backed graph store.

use crate::graph::GraphStore;
use crate::types::{Dependency, Status, Task};
use chrono::{DateTime, SecondsFormat, Utc};
use eyre::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Storage directory name.
pub const TASKDAG_DIR: &str = ".taskdag";

/// SQLite database file.
const DB_FILE: &str = "taskdag.db";

/// How long a writer waits on another process' lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TASK_COLUMNS: &str = "id, title, description, status, created_at, updated_at";

/// Graph store persisted in `<root>/.taskdag/taskdag.db`.
pub struct SqliteStore {
    root: PathBuf,
    db: Connection,
}

impl SqliteStore {
    /// Initialize storage in the given directory.
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(TASKDAG_DIR);
        fs::create_dir_all(&dir).context("Failed to create .taskdag directory")?;
        Self::connect(root)
    }

    /// Open existing storage.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.join(TASKDAG_DIR).exists() {
            eyre::bail!("No .taskdag directory found. Run 'td init' first.");
        }
        Self::connect(root)
    }

    fn connect(root: &Path) -> Result<Self> {
        let db_path = root.join(TASKDAG_DIR).join(DB_FILE);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;
        db.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")?;

        let store = Self {
            root: root.to_path_buf(),
            db,
        };
        store.init_schema()?;
        log::debug!("Opened store at {}", db_path.display());
        Ok(store)
    }

    /// Directory holding the `.taskdag` folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Initialize SQLite schema.
    fn init_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                r#"
                PRAGMA foreign_keys = ON;

                CREATE TABLE IF NOT EXISTS tasks (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT,
                    status TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'completed', 'blocked')),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

                CREATE TABLE IF NOT EXISTS dependencies (
                    task_id TEXT NOT NULL REFERENCES tasks(id),
                    depends_on_id TEXT NOT NULL REFERENCES tasks(id),
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (task_id, depends_on_id),
                    CHECK (task_id <> depends_on_id)
                );
                CREATE INDEX IF NOT EXISTS idx_dependencies_depends_on ON dependencies(depends_on_id);
            "#,
            )
            .context("Failed to initialize schema")?;

        Ok(())
    }

    fn query_edges(&self, sql: &str, key: Option<&str>) -> Result<Vec<Dependency>> {
        let mut stmt = self.db.prepare(sql)?;
        let rows = match key {
            Some(key) => stmt.query_map(params![key], row_to_dependency)?,
            None => stmt.query_map([], row_to_dependency)?,
        };
        let edges = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read dependency rows")?;
        Ok(edges)
    }
}

impl GraphStore for SqliteStore {
    fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        let task = self
            .db
            .query_row(&sql, params![id], row_to_task)
            .optional()
            .with_context(|| format!("Failed to load task {}", id))?;
        Ok(task)
    }

    fn list_tasks(&self, status_filter: Option<Status>) -> Result<Vec<Task>> {
        let mut stmt;
        let rows = match status_filter {
            Some(status) => {
                stmt = self.db.prepare(&format!(
                    "SELECT {} FROM tasks WHERE status = ? ORDER BY rowid",
                    TASK_COLUMNS
                ))?;
                stmt.query_map(params![status.as_str()], row_to_task)?
            }
            None => {
                stmt = self
                    .db
                    .prepare(&format!("SELECT {} FROM tasks ORDER BY rowid", TASK_COLUMNS))?;
                stmt.query_map([], row_to_task)?
            }
        };

        let tasks = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read task rows")?;
        Ok(tasks)
    }

    fn insert_task(&mut self, task: &Task) -> Result<()> {
        self.db
            .execute(
                r#"
                INSERT INTO tasks (id, title, description, status, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.status.as_str(),
                    format_timestamp(&task.created_at),
                    format_timestamp(&task.updated_at),
                ],
            )
            .context("Failed to persist task")?;
        Ok(())
    }

    fn save_task_status(&mut self, task_id: &str, status: Status) -> Result<()> {
        let updated = self
            .db
            .execute(
                "UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?",
                params![status.as_str(), format_timestamp(&Utc::now()), task_id],
            )
            .context("Failed to persist status change")?;
        if updated == 0 {
            eyre::bail!("task {} does not exist", task_id);
        }
        Ok(())
    }

    fn list_dependencies(&self, task_id: &str) -> Result<Vec<Dependency>> {
        self.query_edges(
            "SELECT task_id, depends_on_id, created_at FROM dependencies WHERE task_id = ? ORDER BY rowid",
            Some(task_id),
        )
    }

    fn list_dependents(&self, task_id: &str) -> Result<Vec<Dependency>> {
        self.query_edges(
            "SELECT task_id, depends_on_id, created_at FROM dependencies WHERE depends_on_id = ? ORDER BY rowid",
            Some(task_id),
        )
    }

    fn list_edges(&self) -> Result<Vec<Dependency>> {
        self.query_edges(
            "SELECT task_id, depends_on_id, created_at FROM dependencies ORDER BY rowid",
            None,
        )
    }

    fn create_edge(&mut self, task_id: &str, depends_on_id: &str) -> Result<bool> {
        let inserted = self
            .db
            .execute(
                "INSERT OR IGNORE INTO dependencies (task_id, depends_on_id, created_at) VALUES (?, ?, ?)",
                params![task_id, depends_on_id, format_timestamp(&Utc::now())],
            )
            .context("Failed to persist dependency")?;
        Ok(inserted == 1)
    }

    fn remove_edge(&mut self, task_id: &str, depends_on_id: &str) -> Result<bool> {
        let removed = self
            .db
            .execute(
                "DELETE FROM dependencies WHERE task_id = ? AND depends_on_id = ?",
                params![task_id, depends_on_id],
            )
            .context("Failed to remove dependency")?;
        Ok(removed > 0)
    }

    fn atomically<T, E>(&mut self, f: impl FnOnce(&mut Self) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<eyre::Report>,
    {
        // IMMEDIATE takes the write lock up front so two processes cannot both
        // validate against the same snapshot.
        self.db
            .execute_batch("BEGIN IMMEDIATE")
            .context("Failed to begin transaction")?;

        match f(self) {
            Ok(value) => {
                // A failed COMMIT (e.g. SQLITE_BUSY) leaves the transaction open
                if let Err(e) = self.db.execute_batch("COMMIT").context("Failed to commit transaction") {
                    self.rollback();
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }
}

impl SqliteStore {
    fn rollback(&self) {
        if self.db.is_autocommit() {
            return;
        }
        if let Err(e) = self.db.execute_batch("ROLLBACK") {
            log::warn!("Failed to roll back transaction: {}", e);
        }
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Convert a database row to a Task.
fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let status_str: String = row.get(3)?;
    let status = status_str
        .parse::<Status>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status,
        created_at: parse_timestamp(4, &created_at)?,
        updated_at: parse_timestamp(5, &updated_at)?,
    })
}

fn row_to_dependency(row: &rusqlite::Row) -> rusqlite::Result<Dependency> {
    let created_at: String = row.get(2)?;
    Ok(Dependency {
        task_id: row.get(0)?,
        depends_on_id: row.get(1)?,
        created_at: parse_timestamp(2, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_storage() -> (TempDir, SqliteStore) {
        let temp_dir = TempDir::new().unwrap();
        let storage = SqliteStore::init(temp_dir.path()).unwrap();
        (temp_dir, storage)
    }

    fn task(id: &str, status: Status) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            title: format!("Task {}", id),
            description: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_init_creates_files() {
        let temp_dir = TempDir::new().unwrap();
        let _storage = SqliteStore::init(temp_dir.path()).unwrap();

        assert!(temp_dir.path().join(TASKDAG_DIR).exists());
        assert!(temp_dir.path().join(TASKDAG_DIR).join(DB_FILE).exists());
    }

    #[test]
    fn test_open_without_init_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(SqliteStore::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_insert_and_get_task() {
        let (_temp_dir, mut storage) = setup_test_storage();

        let original = task("td-test000001", Status::InProgress);
        storage.insert_task(&original).unwrap();

        let retrieved = storage.get_task("td-test000001").unwrap().unwrap();
        assert_eq!(retrieved, original);
        assert!(storage.get_task("td-missing0000").unwrap().is_none());
    }

    #[test]
    fn test_description_round_trip() {
        let (temp_dir, mut storage) = setup_test_storage();

        let mut described = task("td-0000000001", Status::Pending);
        described.description = Some("Multi-line\nnotes with ünïcode".to_string());
        storage.insert_task(&described).unwrap();
        storage.insert_task(&task("td-0000000002", Status::Pending)).unwrap();
        drop(storage);

        let reopened = SqliteStore::open(temp_dir.path()).unwrap();
        let loaded = reopened.get_task("td-0000000001").unwrap().unwrap();
        assert_eq!(loaded.description.as_deref(), Some("Multi-line\nnotes with ünïcode"));
        assert!(reopened.get_task("td-0000000002").unwrap().unwrap().description.is_none());
    }

    #[test]
    fn test_list_tasks_by_status() {
        let (_temp_dir, mut storage) = setup_test_storage();

        storage.insert_task(&task("td-0000000001", Status::Pending)).unwrap();
        storage.insert_task(&task("td-0000000002", Status::Completed)).unwrap();
        storage.insert_task(&task("td-0000000003", Status::Pending)).unwrap();

        assert_eq!(storage.list_tasks(None).unwrap().len(), 3);
        assert_eq!(storage.list_tasks(Some(Status::Pending)).unwrap().len(), 2);
        assert_eq!(storage.list_tasks(Some(Status::Completed)).unwrap().len(), 1);
        assert!(storage.list_tasks(Some(Status::Blocked)).unwrap().is_empty());
    }

    #[test]
    fn test_save_task_status() {
        let (_temp_dir, mut storage) = setup_test_storage();
        storage.insert_task(&task("td-0000000001", Status::Pending)).unwrap();

        storage.save_task_status("td-0000000001", Status::Blocked).unwrap();
        let reloaded = storage.get_task("td-0000000001").unwrap().unwrap();
        assert_eq!(reloaded.status, Status::Blocked);
        assert!(reloaded.updated_at >= reloaded.created_at);

        assert!(storage.save_task_status("td-missing0000", Status::Blocked).is_err());
    }

    #[test]
    fn test_edges_round_trip() {
        let (_temp_dir, mut storage) = setup_test_storage();
        for id in ["td-000000000a", "td-000000000b", "td-000000000c"] {
            storage.insert_task(&task(id, Status::Pending)).unwrap();
        }

        assert!(storage.create_edge("td-000000000a", "td-000000000b").unwrap());
        assert!(storage.create_edge("td-000000000c", "td-000000000b").unwrap());
        assert!(!storage.create_edge("td-000000000a", "td-000000000b").unwrap());

        let deps = storage.list_dependencies("td-000000000a").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].depends_on_id, "td-000000000b");

        let dependents: Vec<_> = storage
            .list_dependents("td-000000000b")
            .unwrap()
            .into_iter()
            .map(|e| e.task_id)
            .collect();
        assert_eq!(dependents, vec!["td-000000000a", "td-000000000c"]);
        assert_eq!(storage.list_edges().unwrap().len(), 2);

        assert!(storage.remove_edge("td-000000000a", "td-000000000b").unwrap());
        assert!(!storage.remove_edge("td-000000000a", "td-000000000b").unwrap());
        assert_eq!(storage.list_edges().unwrap().len(), 1);
    }

    #[test]
    fn test_edge_to_unknown_task_rejected() {
        let (_temp_dir, mut storage) = setup_test_storage();
        storage.insert_task(&task("td-000000000a", Status::Pending)).unwrap();

        assert!(storage.create_edge("td-000000000a", "td-nothere000").is_err());
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let (_temp_dir, mut storage) = setup_test_storage();

        let result: Result<()> = storage.atomically(|store| {
            store.insert_task(&task("td-000000000a", Status::Pending))?;
            eyre::bail!("abort")
        });
        assert!(result.is_err());
        assert!(storage.get_task("td-000000000a").unwrap().is_none());

        storage
            .atomically(|store| store.insert_task(&task("td-000000000b", Status::Pending)))
            .unwrap();
        assert!(storage.get_task("td-000000000b").unwrap().is_some());
    }

    #[test]
    fn test_failed_commit_leaves_connection_usable() {
        let (temp_dir, mut storage) = setup_test_storage();
        storage.db.busy_timeout(Duration::from_millis(50)).unwrap();
        storage.insert_task(&task("td-000000000a", Status::Pending)).unwrap();

        // A second connection holding a read transaction blocks our COMMIT
        let reader = Connection::open(temp_dir.path().join(TASKDAG_DIR).join(DB_FILE)).unwrap();
        reader.execute_batch("BEGIN").unwrap();
        let count: i64 = reader
            .query_row("SELECT count(*) FROM tasks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let result = storage.atomically(|store| store.save_task_status("td-000000000a", Status::Blocked));
        assert!(result.is_err());
        assert!(storage.db.is_autocommit());

        reader.execute_batch("COMMIT").unwrap();
        drop(reader);

        // The failed write was rolled back
        assert_eq!(
            storage.get_task("td-000000000a").unwrap().unwrap().status,
            Status::Pending
        );

        storage
            .atomically(|store| store.save_task_status("td-000000000a", Status::Blocked))
            .unwrap();
        assert_eq!(
            storage.get_task("td-000000000a").unwrap().unwrap().status,
            Status::Blocked
        );
    }

    #[test]
    fn test_data_survives_reopen() {
        let (temp_dir, mut storage) = setup_test_storage();
        storage.insert_task(&task("td-000000000a", Status::Pending)).unwrap();
        storage.insert_task(&task("td-000000000b", Status::Completed)).unwrap();
        storage.create_edge("td-000000000a", "td-000000000b").unwrap();
        drop(storage);

        let reopened = SqliteStore::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.list_tasks(None).unwrap().len(), 2);
        assert_eq!(reopened.list_edges().unwrap().len(), 1);
    }
}
