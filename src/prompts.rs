//! Per-step prompts and request construction
//!
//! Each pipeline step talks to the same model with a different system
//! prompt. The conversation is replayed as-is; when it ends with an
//! assistant turn a short instruction for the step is appended so the
//! request never ends on an assistant message.

use crate::llm::{LlmMessage, LlmRequest, SystemContent};
use crate::state_machine::{PipelineState, Role, Step};

const SPEC_PROMPT: &str = r#"You design example HTTP APIs. Produce an API specification in JSON that a developer could implement directly.

Requirements:
- At least four endpoints: two GET and two POST.
- Base the theme on something people use in daily life. The user may suggest a theme; follow it when they do.
- Use realistic resource names. Never name anything "test" or "example".
- Describe request bodies, response bodies and status codes for every endpoint.

Return only the JSON specification."#;

const CODE_PROMPT: &str = r"You implement HTTP APIs in Python with FastAPI.

You receive an API specification in JSON. Write a complete, runnable FastAPI application that implements every endpoint in it, with Pydantic models for request and response bodies and in-memory storage.

Return only the code, wrapped in a single ```python fenced block that is properly closed. No explanation, no restated specification.";

const REFINE_PROMPT: &str = r"You review Python FastAPI code and fix it.

Make sure the code runs: imports are complete, models match the endpoints, status codes and error handling are correct. If the code is already correct, return it unchanged.

Return only the full corrected code, wrapped in a single ```python fenced block that is properly closed. No explanation.";

const TEST_PROMPT: &str = r"You write pytest suites for FastAPI applications.

For the application you are given, write tests that:
1. Cover the success case of every endpoint.
2. Cover error cases and edge cases (missing resources, invalid bodies).
3. Use pytest fixtures where they help.
4. Use fastapi.testclient.TestClient against the application imported from generated_api.
5. Have descriptive test names and precise assertions.

Return only the test code, wrapped in a single ```python fenced block that is properly closed. No explanation.";

/// System prompt for a step
pub fn system_prompt(step: Step) -> &'static str {
    match step {
        Step::Spec => SPEC_PROMPT,
        Step::Code => CODE_PROMPT,
        Step::Refine => REFINE_PROMPT,
        Step::Test | Step::Terminal => TEST_PROMPT,
    }
}

/// User turn appended when the conversation ends with the model speaking
fn step_instruction(step: Step) -> &'static str {
    match step {
        Step::Spec => "Create the API specification.",
        Step::Code => "Write the FastAPI implementation of the API specification above.",
        Step::Refine => "Review the code above and return the corrected version.",
        Step::Test | Step::Terminal => "Write the pytest suite for the code above.",
    }
}

/// Build the generation request for `step` from the current conversation.
pub fn build_request(step: Step, state: &PipelineState, max_tokens: Option<u32>) -> LlmRequest {
    let mut messages: Vec<LlmMessage> = state.messages.iter().map(LlmMessage::from).collect();

    let ends_with_user = state.last_message().is_some_and(|m| m.role == Role::User);
    if !ends_with_user {
        messages.push(LlmMessage::user(step_instruction(step)));
    }

    LlmRequest {
        system: vec![SystemContent::cached(system_prompt(step))],
        messages,
        max_tokens,
    }
}
