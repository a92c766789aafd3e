//! Pure state transition function
//!
//! Given the same state, step and event this always produces the same
//! result. All I/O is described by the returned effects.

use super::state::{Message, Outcome, PipelineState, Step};
use super::{Effect, Event, StepError};
use crate::artifacts::{extract_code, API_FILE, TESTS_FILE};
use thiserror::Error;

/// Outcome of a single pipeline step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Success { content: String, next: Step },
    Failure { message: String, next: Step },
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(self, StepResult::Success { .. })
    }
}

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub step: Step,
    pub state: PipelineState,
    /// Set when the event finished a step
    pub step_result: Option<StepResult>,
    pub effects: Vec<Effect>,
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Run already finished")]
    RunFinished,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Begin a run for one user input.
pub fn start(input: &str) -> TransitionResult {
    TransitionResult {
        step: Step::Spec,
        state: PipelineState::new(input),
        step_result: None,
        effects: std::iter::once(Effect::Checkpoint)
            .chain(entry_effects(Step::Spec))
            .collect(),
    }
}

/// Effects that kick off a step once it has been entered
pub fn entry_effects(step: Step) -> Vec<Effect> {
    match step {
        Step::Spec | Step::Code | Step::Refine => vec![Effect::RequestGeneration { step }],
        Step::Test => vec![Effect::load(API_FILE)],
        Step::Terminal => vec![],
    }
}

pub fn transition(
    state: &PipelineState,
    step: Step,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (step, event) {
        (Step::Terminal, _) => Err(TransitionError::RunFinished),

        // The API code becomes part of the conversation before tests are generated
        (Step::Test, Event::ArtifactLoaded { content, .. }) => {
            let request = format!("Generate pytest tests for this FastAPI code:\n\n{content}");
            Ok(TransitionResult {
                step: Step::Test,
                state: state.with_message(Message::user(request.trim())),
                step_result: None,
                effects: vec![Effect::Checkpoint, Effect::RequestGeneration { step: Step::Test }],
            })
        }

        (_, Event::ArtifactLoaded { filename, .. }) => Err(TransitionError::InvalidTransition(
            format!("{filename} loaded during {step} step"),
        )),

        (_, Event::Failed { error }) => Ok(fail(state, step, &error)),

        (_, Event::Generated { content }) => Ok(succeed(state, step, &content)),
    }
}

fn succeed(state: &PipelineState, step: Step, content: &str) -> TransitionResult {
    let trimmed = content.trim();
    let entered_from_code = state.from_code_step;
    let mut next_state = state.clone();

    let (artifact, message_content) = match step {
        Step::Code => {
            next_state.from_code_step = true;
            (Some(API_FILE), trimmed.to_string())
        }
        Step::Refine => {
            next_state.from_code_step = false;
            let target = if entered_from_code { API_FILE } else { TESTS_FILE };
            (Some(target), trimmed.to_string())
        }
        Step::Test => (
            Some(TESTS_FILE),
            format!("API tests have been generated and saved to {TESTS_FILE}\n\n{trimmed}"),
        ),
        Step::Spec | Step::Terminal => (None, trimmed.to_string()),
    };

    let mut effects = Vec::new();
    if let Some(filename) = artifact {
        let code = extract_code(trimmed);
        if code.is_empty() {
            let error = StepError::Persistence {
                filename: filename.to_string(),
                message: "response contained no code".to_string(),
            };
            return fail(state, step, &error);
        }
        effects.push(Effect::persist(filename, code));
    }

    let next = step.next(Outcome::Success, entered_from_code);
    let message = Message::assistant(message_content, step.node_name());
    next_state.messages.push(message.clone());

    effects.push(Effect::notify(message));
    effects.push(Effect::Checkpoint);
    effects.extend(entry_effects(next));

    TransitionResult {
        step: next,
        state: next_state,
        step_result: Some(StepResult::Success {
            content: trimmed.to_string(),
            next,
        }),
        effects,
    }
}

fn fail(state: &PipelineState, step: Step, error: &StepError) -> TransitionResult {
    let message = format!("{}: {error}", failure_prefix(step, error));
    let record = Message::assistant(message.clone(), step.node_name());
    let next = step.next(Outcome::Failure, state.from_code_step);
    let mut next_state = state.with_message(record.clone());
    next_state.from_code_step = false;

    TransitionResult {
        step: next,
        state: next_state,
        step_result: Some(StepResult::Failure { message, next }),
        effects: vec![Effect::notify(record), Effect::Checkpoint],
    }
}

fn failure_prefix(step: Step, error: &StepError) -> &'static str {
    if let StepError::Read { .. } = error {
        return "Error reading generated API code";
    }
    match step {
        Step::Spec => "Error generating API spec",
        Step::Code => "Error generating code",
        Step::Refine => "Error refining code",
        Step::Test => "Error generating tests",
        Step::Terminal => "Error",
    }
}
