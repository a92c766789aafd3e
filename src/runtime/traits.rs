//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::artifacts::{ArtifactError, FsArtifactStore};
use crate::checkpoint::{
    Checkpoint, CheckpointResult, MemoryCheckpointStore, SqliteCheckpointStore,
};
use crate::llm::{LlmError, LlmRequest, LlmResponse, ModelRegistry};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete an LLM request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Sink for generated source files
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Overwrite `filename` with `content`, returning where it landed
    async fn save(&self, content: &str, filename: &str) -> Result<PathBuf, ArtifactError>;

    /// Read back a previously saved artifact
    async fn load(&self, filename: &str) -> Result<String, ArtifactError>;
}

/// Storage for run checkpoints, keyed by thread id
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()>;

    async fn load(&self, thread_id: &str) -> CheckpointResult<Option<Checkpoint>>;

    async fn discard(&self, thread_id: &str) -> CheckpointResult<()>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: ArtifactStore + ?Sized> ArtifactStore for Arc<T> {
    async fn save(&self, content: &str, filename: &str) -> Result<PathBuf, ArtifactError> {
        (**self).save(content, filename).await
    }

    async fn load(&self, filename: &str) -> Result<String, ArtifactError> {
        (**self).load(filename).await
    }
}

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    async fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        (**self).save(checkpoint).await
    }

    async fn load(&self, thread_id: &str) -> CheckpointResult<Option<Checkpoint>> {
        (**self).load(thread_id).await
    }

    async fn discard(&self, thread_id: &str) -> CheckpointResult<()> {
        (**self).discard(thread_id).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use `ModelRegistry` as `LlmClient`
pub struct RegistryLlmClient {
    registry: Arc<ModelRegistry>,
    model_id: String,
}

impl RegistryLlmClient {
    pub fn new(registry: Arc<ModelRegistry>, model_id: String) -> Self {
        Self { registry, model_id }
    }
}

#[async_trait]
impl LlmClient for RegistryLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let llm = self
            .registry
            .get(&self.model_id)
            .or_else(|| self.registry.default())
            .ok_or_else(|| LlmError::network("No LLM available"))?;
        llm.complete(request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn save(&self, content: &str, filename: &str) -> Result<PathBuf, ArtifactError> {
        FsArtifactStore::save(self, content, filename).await
    }

    async fn load(&self, filename: &str) -> Result<String, ArtifactError> {
        FsArtifactStore::load(self, filename).await
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        MemoryCheckpointStore::save(self, checkpoint)
    }

    async fn load(&self, thread_id: &str) -> CheckpointResult<Option<Checkpoint>> {
        MemoryCheckpointStore::load(self, thread_id)
    }

    async fn discard(&self, thread_id: &str) -> CheckpointResult<()> {
        MemoryCheckpointStore::discard(self, thread_id)
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        SqliteCheckpointStore::save(self, checkpoint)
    }

    async fn load(&self, thread_id: &str) -> CheckpointResult<Option<Checkpoint>> {
        SqliteCheckpointStore::load(self, thread_id)
    }

    async fn discard(&self, thread_id: &str) -> CheckpointResult<()> {
        SqliteCheckpointStore::discard(self, thread_id)
    }
}
