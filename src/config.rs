//! Startup configuration from the environment

use crate::checkpoint::CheckpointRetention;
use crate::runtime::RunOptions;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Everything the driver needs besides LLM credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory generated files are written to
    pub output_dir: PathBuf,
    /// Scopes checkpointing
    pub thread_id: String,
    /// SQLite file for checkpoints; in-memory when unset
    pub checkpoint_db: Option<PathBuf>,
    pub retention: CheckpointRetention,
    pub max_tokens: Option<u32>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let checkpoint_db = get("API_TESTER_CHECKPOINT_DB").map(PathBuf::from);

        // Durable checkpoints are kept unless told otherwise
        let retention = match get("API_TESTER_CHECKPOINT_RETENTION") {
            Some(value) => value.parse().map_err(|message| ConfigError::Invalid {
                var: "API_TESTER_CHECKPOINT_RETENTION",
                message,
            })?,
            None if checkpoint_db.is_some() => CheckpointRetention::Keep,
            None => CheckpointRetention::Discard,
        };

        let max_tokens = match get("API_TESTER_MAX_TOKENS") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: "API_TESTER_MAX_TOKENS",
                        value,
                    })
                }
            },
            None => None,
        };

        Ok(Self {
            output_dir: get("API_TESTER_OUTPUT_DIR")
                .map_or_else(|| PathBuf::from("."), PathBuf::from),
            thread_id: get("API_TESTER_THREAD_ID").unwrap_or_else(|| "1".to_string()),
            checkpoint_db,
            retention,
            max_tokens,
        })
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            thread_id: self.thread_id.clone(),
            retention: self.retention,
            max_tokens: self.max_tokens,
        }
    }
}
