//! Events that can occur during a pipeline run

use thiserror::Error;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// The generation service answered for the current step
    Generated { content: String },
    /// A previously persisted artifact was read back (Test step input)
    ArtifactLoaded { filename: String, content: String },
    /// Something failed at the step boundary
    Failed { error: StepError },
}

impl Event {
    pub fn failed(error: StepError) -> Self {
        Event::Failed { error }
    }
}

/// Failures caught at the step boundary. Every one of them ends the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("{0}")]
    Generation(String),
    #[error("failed to save {filename}: {message}")]
    Persistence { filename: String, message: String },
    #[error("failed to read {filename}: {message}")]
    Read { filename: String, message: String },
}
