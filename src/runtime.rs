//! Runtime for executing pipeline runs
//!
//! The executor feeds events into the pure state machine and performs the
//! effects it returns against the generation service, the artifact store
//! and the checkpoint store.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{PipelineRuntime, RunOptions, RunReport, RuntimeError};
pub use traits::*;

use crate::state_machine::{Message, Step};
use std::path::PathBuf;
use std::sync::Arc;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime =
    PipelineRuntime<crate::artifacts::FsArtifactStore, RegistryLlmClient, Arc<dyn CheckpointStore>>;

/// Events streamed to the driver while a run progresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StepStarted { step: Step },
    Message { message: Message },
    ArtifactSaved { path: PathBuf },
    Finished { succeeded: bool },
}
