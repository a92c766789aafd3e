//! Effects produced by state transitions

use super::state::{Message, Step};

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write extracted source text; must succeed before the transition commits
    PersistArtifact { filename: String, content: String },

    /// Read a previously generated artifact
    LoadArtifact { filename: String },

    /// Invoke the generation service for a step
    RequestGeneration { step: Step },

    /// Stream a message to the driver
    Notify { message: Message },

    /// Snapshot the committed state
    Checkpoint,
}

impl Effect {
    pub fn persist(filename: &str, content: impl Into<String>) -> Self {
        Effect::PersistArtifact {
            filename: filename.to_string(),
            content: content.into(),
        }
    }

    pub fn load(filename: &str) -> Self {
        Effect::LoadArtifact {
            filename: filename.to_string(),
        }
    }

    pub fn notify(message: Message) -> Self {
        Effect::Notify { message }
    }

    /// Whether the effect has to succeed before the transition commits
    pub fn is_persistence(&self) -> bool {
        matches!(self, Effect::PersistArtifact { .. })
    }
}
