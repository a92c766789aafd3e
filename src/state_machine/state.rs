//! Pipeline state types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single conversation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Node name of the step that produced an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: Some(name.into()),
        }
    }
}

/// Conversation state threaded through the pipeline steps
///
/// `messages` is append-only within a run. `from_code_step` is set by a
/// successful Code step and consumed by the Refine step right after it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub messages: Vec<Message>,
    pub from_code_step: bool,
}

impl PipelineState {
    /// Fresh state seeded with the user's request
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(input)],
            from_code_step: false,
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Copy of this state with one more message
    pub fn with_message(&self, message: Message) -> Self {
        let mut next = self.clone();
        next.messages.push(message);
        next
    }
}

/// Pipeline steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Spec,
    Code,
    Refine,
    Test,
    Terminal,
}

/// How a step ended, for the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Step {
    /// Name attached to the messages a step emits
    pub fn node_name(self) -> &'static str {
        match self {
            Step::Spec => "create_api_spec_node",
            Step::Code => "create_code_node",
            Step::Refine => "create_refinement_node",
            Step::Test => "create_api_tests_node",
            Step::Terminal => "__end__",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Step::Terminal)
    }

    /// Fixed transition table.
    ///
    /// `from_code_step` is the flag as it was when the step was entered;
    /// only Refine looks at it.
    pub fn next(self, outcome: Outcome, from_code_step: bool) -> Step {
        match (self, outcome) {
            (_, Outcome::Failure) | (Step::Test | Step::Terminal, Outcome::Success) => {
                Step::Terminal
            }
            (Step::Spec, Outcome::Success) => Step::Code,
            (Step::Code, Outcome::Success) => Step::Refine,
            (Step::Refine, Outcome::Success) if from_code_step => Step::Test,
            (Step::Refine, Outcome::Success) => Step::Terminal,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Spec => "spec",
            Step::Code => "code",
            Step::Refine => "refine",
            Step::Test => "test",
            Step::Terminal => "terminal",
        };
        f.write_str(name)
    }
}
