//! Run-keyed checkpoints of pipeline state
//!
//! A checkpoint is written when a run starts and after every committed
//! transition. What happens to it when the run ends is decided by
//! [`CheckpointRetention`].

mod sqlite;

pub use sqlite::SqliteCheckpointStore;

use crate::state_machine::{PipelineState, Step};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Checkpoint store lock poisoned")]
    Poisoned,
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Snapshot of a run at a step boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub run_id: String,
    pub step: Step,
    pub state: PipelineState,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(thread_id: &str, run_id: &str, step: Step, state: &PipelineState) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
            step,
            state: state.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// What to do with a thread's checkpoint once its run ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointRetention {
    Keep,
    Discard,
}

impl FromStr for CheckpointRetention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "discard" => Ok(Self::Discard),
            other => Err(format!(
                "unknown checkpoint retention '{other}' (expected keep or discard)"
            )),
        }
    }
}

/// In-process checkpoints, gone when the process exits
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        self.checkpoints
            .lock()
            .map_err(|_| CheckpointError::Poisoned)?
            .insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    pub fn load(&self, thread_id: &str) -> CheckpointResult<Option<Checkpoint>> {
        Ok(self
            .checkpoints
            .lock()
            .map_err(|_| CheckpointError::Poisoned)?
            .get(thread_id)
            .cloned())
    }

    pub fn discard(&self, thread_id: &str) -> CheckpointResult<()> {
        self.checkpoints
            .lock()
            .map_err(|_| CheckpointError::Poisoned)?
            .remove(thread_id);
        Ok(())
    }
}
