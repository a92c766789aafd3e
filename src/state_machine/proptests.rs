//! Property-based tests for the state machine
//!
//! These tests drive the transition function with arbitrary event streams
//! and check the invariants that must hold for every reachable state.

use super::*;
use crate::artifacts::{extract_code, API_FILE};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_step_error() -> impl Strategy<Value = StepError> {
    prop_oneof![
        "[a-zA-Z ]{1,30}".prop_map(StepError::Generation),
        "[a-z ]{1,20}".prop_map(|message| StepError::Persistence {
            filename: API_FILE.to_string(),
            message,
        }),
        "[a-z ]{1,20}".prop_map(|message| StepError::Read {
            filename: API_FILE.to_string(),
            message,
        }),
    ]
}

fn arb_response() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 =()\n]{0,40}",
        "[a-zA-Z0-9 =()]{1,40}".prop_map(|code| format!("```python\n{code}\n```")),
        "[a-zA-Z0-9 =()]{1,40}".prop_map(|code| format!("Here you go:\n```python\n{code}")),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        4 => arb_response().prop_map(|content| Event::Generated { content }),
        1 => arb_step_error().prop_map(Event::failed),
        1 => "[a-z =]{0,30}".prop_map(|content| Event::ArtifactLoaded {
            filename: API_FILE.to_string(),
            content,
        }),
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Spec),
        Just(Step::Code),
        Just(Step::Refine),
        Just(Step::Test),
    ]
}

/// Effects that start more work
fn requests_work(effects: &[Effect]) -> bool {
    effects
        .iter()
        .any(|e| matches!(e, Effect::RequestGeneration { .. } | Effect::LoadArtifact { .. }))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Walking a run with arbitrary events never breaks the flag invariant,
    /// never drops messages and never revisits a step.
    #[test]
    fn prop_run_invariants(
        input in "[a-zA-Z ]{1,20}",
        events in proptest::collection::vec(arb_event(), 0..12),
    ) {
        let started = start(&input);
        let mut step = started.step;
        let mut state = started.state;
        let mut visited = vec![step];

        for event in events {
            let Ok(result) = transition(&state, step, event) else {
                continue;
            };

            prop_assert!(result.state.messages.len() > state.messages.len());
            prop_assert_eq!(&result.state.messages[..state.messages.len()], &state.messages[..]);
            if result.state.from_code_step {
                prop_assert_eq!(result.step, Step::Refine);
            }
            if result.step != step {
                prop_assert!(!visited.contains(&result.step));
                visited.push(result.step);
            }

            step = result.step;
            state = result.state;
        }
    }

    /// Every failure goes straight to Terminal and schedules nothing else.
    #[test]
    fn prop_failure_is_terminal(
        step in arb_step(),
        flag in any::<bool>(),
        error in arb_step_error(),
    ) {
        let mut state = PipelineState::new("billing API");
        state.from_code_step = flag;

        let result = transition(&state, step, Event::failed(error)).unwrap();
        prop_assert_eq!(result.step, Step::Terminal);
        prop_assert!(!requests_work(&result.effects));
        prop_assert_eq!(result.state.messages.len(), 2);
        let last = result.state.last_message().unwrap();
        prop_assert_eq!(last.role, Role::Assistant);
        prop_assert_eq!(last.name.as_deref(), Some(step.node_name()));
        let is_failure = matches!(result.step_result, Some(StepResult::Failure { .. }));
        prop_assert!(is_failure, "step result should be a failure");
    }

    /// Persisted content is exactly what extraction produced.
    #[test]
    fn prop_persisted_content_matches_extraction(step in arb_step(), content in arb_response()) {
        let state = PipelineState::new("billing API");
        let event = Event::Generated { content: content.clone() };
        let result = transition(&state, step, event).unwrap();

        for effect in &result.effects {
            if let Effect::PersistArtifact { content: saved, .. } = effect {
                prop_assert_eq!(saved.as_str(), extract_code(content.trim()));
                prop_assert!(!saved.is_empty());
            }
        }
    }

    /// Terminal accepts nothing.
    #[test]
    fn prop_terminal_rejects_everything(event in arb_event()) {
        let state = PipelineState::new("billing API");
        prop_assert_eq!(
            transition(&state, Step::Terminal, event).unwrap_err(),
            TransitionError::RunFinished
        );
    }
}

#[test]
fn test_happy_path_walk() {
    let started = start("billing API");
    let mut step = started.step;
    let mut state = started.state;
    let mut saved = Vec::new();

    let responses = [
        Event::Generated {
            content: "{\"endpoints\": [\"GET /invoices\"]}".to_string(),
        },
        Event::Generated {
            content: "```python\napp = FastAPI()\n```".to_string(),
        },
        Event::Generated {
            content: "```python\napp = FastAPI(title=\"billing\")\n```".to_string(),
        },
        Event::ArtifactLoaded {
            filename: API_FILE.to_string(),
            content: "app = FastAPI(title=\"billing\")".to_string(),
        },
        Event::Generated {
            content: "```python\ndef test_list(): pass\n```".to_string(),
        },
    ];

    let mut steps = vec![step];
    for event in responses {
        let result = transition(&state, step, event).unwrap();
        for effect in &result.effects {
            if let Effect::PersistArtifact { filename, .. } = effect {
                saved.push(filename.clone());
            }
        }
        step = result.step;
        state = result.state;
        steps.push(step);
    }

    assert_eq!(
        steps,
        vec![Step::Spec, Step::Code, Step::Refine, Step::Test, Step::Test, Step::Terminal]
    );
    assert_eq!(saved, vec![API_FILE, API_FILE, "generated_api_tests.py"]);
    assert!(!state.from_code_step);
    // user, spec, code, refine, test request, tests
    assert_eq!(state.messages.len(), 6);
}
