//! SQLite-backed checkpoints that survive restarts

use super::{Checkpoint, CheckpointError, CheckpointResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL,
    step TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Thread-safe checkpoint database handle
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
    /// Open or create the checkpoint database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> CheckpointResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> CheckpointResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> CheckpointResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> CheckpointResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CheckpointError::Poisoned)
    }

    /// Insert or replace the checkpoint for its thread
    pub fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        let data = serde_json::to_string(checkpoint)?;
        self.conn()?.execute(
            "INSERT INTO checkpoints (thread_id, run_id, step, data, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(thread_id) DO UPDATE SET
                run_id = excluded.run_id,
                step = excluded.step,
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![
                checkpoint.thread_id,
                checkpoint.run_id,
                checkpoint.step.to_string(),
                data,
                checkpoint.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load(&self, thread_id: &str) -> CheckpointResult<Option<Checkpoint>> {
        let data: Option<String> = self
            .conn()?
            .query_row(
                "SELECT data FROM checkpoints WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;

        data.map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(CheckpointError::from)
    }

    pub fn discard(&self, thread_id: &str) -> CheckpointResult<()> {
        self.conn()?
            .execute("DELETE FROM checkpoints WHERE thread_id = ?1", params![thread_id])?;
        Ok(())
    }
}
