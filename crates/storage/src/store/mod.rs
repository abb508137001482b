#![forbid(unsafe_code)]

mod artifacts;
mod dependencies;
mod error;
mod requests;
mod tasks;

pub use error::StoreError;
pub use requests::*;

use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wbs_core::ids::EntityId;

const SCHEMA_VERSION: i64 = 1;
const DB_FILE: &str = "wbs.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self.conn.transaction()?)
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    let now_ms = now_ms();

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
          id TEXT PRIMARY KEY,
          parent_id TEXT,
          title TEXT NOT NULL,
          description TEXT,
          assignee TEXT,
          status TEXT NOT NULL,
          estimate TEXT,
          version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          FOREIGN KEY(parent_id) REFERENCES tasks(id) ON DELETE RESTRICT,
          CHECK(parent_id IS NULL OR parent_id <> id)
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);

        CREATE TABLE IF NOT EXISTS artifacts (
          id TEXT PRIMARY KEY,
          title TEXT NOT NULL,
          uri TEXT,
          description TEXT,
          version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS task_artifact_assignments (
          task_id TEXT NOT NULL,
          artifact_id TEXT NOT NULL,
          role TEXT NOT NULL,
          crud_operation TEXT,
          order_index INTEGER NOT NULL,
          PRIMARY KEY(task_id, role, artifact_id),
          FOREIGN KEY(task_id) REFERENCES tasks(id) ON DELETE RESTRICT,
          FOREIGN KEY(artifact_id) REFERENCES artifacts(id) ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_assignments_artifact
          ON task_artifact_assignments(artifact_id);

        CREATE TABLE IF NOT EXISTS completion_conditions (
          task_id TEXT NOT NULL,
          order_index INTEGER NOT NULL,
          condition TEXT NOT NULL,
          PRIMARY KEY(task_id, order_index),
          FOREIGN KEY(task_id) REFERENCES tasks(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS dependencies (
          dependee_task_id TEXT NOT NULL,
          dependency_task_id TEXT NOT NULL,
          artifact_ids TEXT NOT NULL DEFAULT '[]',
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY(dependee_task_id, dependency_task_id),
          FOREIGN KEY(dependee_task_id) REFERENCES tasks(id) ON DELETE RESTRICT,
          FOREIGN KEY(dependency_task_id) REFERENCES tasks(id) ON DELETE RESTRICT,
          CHECK(dependee_task_id <> dependency_task_id)
        );

        CREATE INDEX IF NOT EXISTS idx_dependencies_dependency
          ON dependencies(dependency_task_id);

        CREATE TABLE IF NOT EXISTS task_history (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          task_id TEXT NOT NULL,
          event_type TEXT NOT NULL,
          payload_json TEXT NOT NULL,
          ts_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_task_history_task
          ON task_history(task_id, seq);
        "#,
    )?;

    conn.execute(
        "INSERT INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}

pub(crate) fn next_counter_tx(tx: &Transaction<'_>, name: &str) -> Result<i64, StoreError> {
    tx.execute(
        "INSERT INTO counters(name, value) VALUES (?1, 1) \
         ON CONFLICT(name) DO UPDATE SET value = value + 1",
        params![name],
    )?;
    let value = tx.query_row(
        "SELECT value FROM counters WHERE name=?1",
        params![name],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(value)
}

pub(crate) fn task_exists_tx(tx: &Transaction<'_>, task_id: &str) -> Result<bool, StoreError> {
    Ok(tx
        .query_row(
            "SELECT 1 FROM tasks WHERE id=?1",
            params![task_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub(crate) fn ensure_task_exists_tx(tx: &Transaction<'_>, task_id: &str) -> Result<(), StoreError> {
    if task_exists_tx(tx, task_id)? {
        Ok(())
    } else {
        Err(StoreError::UnknownId)
    }
}

pub(crate) fn ensure_artifact_exists_tx(
    tx: &Transaction<'_>,
    artifact_id: &str,
) -> Result<(), StoreError> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM artifacts WHERE id=?1",
            params![artifact_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some();

    if exists {
        Ok(())
    } else {
        Err(StoreError::UnknownId)
    }
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

pub(crate) fn map_insert_conflict(err: rusqlite::Error) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::AlreadyExists;
    }
    StoreError::Sql(err)
}

pub(crate) fn canonicalize_task_id(value: &str) -> Result<String, StoreError> {
    EntityId::try_new(value)
        .map(|id| id.as_str().to_string())
        .map_err(|_| StoreError::InvalidInput("invalid task id"))
}

pub(crate) fn canonicalize_artifact_id(value: &str) -> Result<String, StoreError> {
    EntityId::try_new(value)
        .map(|id| id.as_str().to_string())
        .map_err(|_| StoreError::InvalidInput("invalid artifact id"))
}

pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
