//! Mock implementations for testing
//!
//! These mocks enable running whole pipelines without real I/O.

use super::traits::*;
use super::{PipelineEvent, PipelineRuntime, RunOptions, RunReport};
use crate::artifacts::ArtifactError;
use crate::checkpoint::{Checkpoint, CheckpointError, CheckpointResult, MemoryCheckpointStore};
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful text response
    pub fn queue_text(&self, text: &str) {
        self.queue_response(LlmResponse::text_only(text));
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Artifact Store
// ============================================================================

/// In-memory artifact store with injectable failures
#[derive(Default)]
pub struct MemoryArtifactStore {
    files: Mutex<HashMap<String, String>>,
    failing_saves: HashSet<String>,
    failing_loads: bool,
    /// Number of successful saves
    pub save_count: Mutex<usize>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every save of `filename` fail
    pub fn fail_saves_of(mut self, filename: &str) -> Self {
        self.failing_saves.insert(filename.to_string());
        self
    }

    /// Make every load fail
    pub fn fail_loads(mut self) -> Self {
        self.failing_loads = true;
        self
    }

    pub fn get(&self, filename: &str) -> Option<String> {
        self.files.lock().unwrap().get(filename).cloned()
    }

    pub fn saves(&self) -> usize {
        *self.save_count.lock().unwrap()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn save(&self, content: &str, filename: &str) -> Result<PathBuf, ArtifactError> {
        if self.failing_saves.contains(filename) {
            return Err(ArtifactError::Io {
                path: PathBuf::from(filename),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.files
            .lock()
            .unwrap()
            .insert(filename.to_string(), content.to_string());
        *self.save_count.lock().unwrap() += 1;
        Ok(PathBuf::from(filename))
    }

    async fn load(&self, filename: &str) -> Result<String, ArtifactError> {
        if self.failing_loads {
            return Err(ArtifactError::Io {
                path: PathBuf::from(filename),
                source: io::Error::other("disk on fire"),
            });
        }
        self.get(filename)
            .ok_or_else(|| ArtifactError::NotFound(filename.to_string()))
    }
}

// ============================================================================
// Recording Checkpoint Store
// ============================================================================

/// Checkpoint store that records every save
#[derive(Default)]
pub struct RecordingCheckpointStore {
    inner: MemoryCheckpointStore,
    failing: bool,
    pub saves: Mutex<Vec<Checkpoint>>,
}

impl RecordingCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose every operation fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<Checkpoint> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckpointStore for RecordingCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        if self.failing {
            return Err(CheckpointError::Poisoned);
        }
        self.saves.lock().unwrap().push(checkpoint.clone());
        self.inner.save(checkpoint)
    }

    async fn load(&self, thread_id: &str) -> CheckpointResult<Option<Checkpoint>> {
        self.inner.load(thread_id)
    }

    async fn discard(&self, thread_id: &str) -> CheckpointResult<()> {
        if self.failing {
            return Err(CheckpointError::Poisoned);
        }
        self.inner.discard(thread_id)
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

/// Pipeline runtime wired to mocks, with handles to inspect them
pub struct TestRuntime {
    pub llm: Arc<MockLlmClient>,
    pub artifacts: Arc<MemoryArtifactStore>,
    pub checkpoints: Arc<RecordingCheckpointStore>,
    runtime: PipelineRuntime<
        Arc<MemoryArtifactStore>,
        Arc<MockLlmClient>,
        Arc<RecordingCheckpointStore>,
    >,
}

impl TestRuntime {
    pub fn new() -> TestRuntimeBuilder {
        TestRuntimeBuilder::default()
    }

    /// Run the pipeline and collect everything it streamed
    pub async fn run(&self, input: &str) -> (RunReport, Vec<PipelineEvent>) {
        let (tx, mut rx) = mpsc::channel(16);
        let collect = async move {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        };
        let (report, events) = tokio::join!(self.runtime.run(input, tx), collect);
        (report.expect("run should reach the end"), events)
    }
}

#[derive(Default)]
pub struct TestRuntimeBuilder {
    llm: Option<MockLlmClient>,
    artifacts: Option<MemoryArtifactStore>,
    checkpoints: Option<RecordingCheckpointStore>,
    options: RunOptions,
}

impl TestRuntimeBuilder {
    pub fn llm(mut self, llm: MockLlmClient) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn artifacts(mut self, artifacts: MemoryArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn checkpoints(mut self, checkpoints: RecordingCheckpointStore) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> TestRuntime {
        let llm = Arc::new(self.llm.unwrap_or_else(|| MockLlmClient::new("test-model")));
        let artifacts = Arc::new(self.artifacts.unwrap_or_default());
        let checkpoints = Arc::new(self.checkpoints.unwrap_or_default());

        let runtime = PipelineRuntime::new(
            artifacts.clone(),
            llm.clone(),
            checkpoints.clone(),
            self.options,
        );

        TestRuntime {
            llm,
            artifacts,
            checkpoints,
            runtime,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{FsArtifactStore, API_FILE, TESTS_FILE};
    use crate::checkpoint::CheckpointRetention;
    use crate::llm::MessageRole;
    use crate::state_machine::{Role, Step, StepResult};

    const SPEC: &str = r#"{"name": "billing", "endpoints": ["GET /invoices", "GET /invoices/{id}", "POST /invoices", "POST /payments"]}"#;
    const CODE: &str = "```python\nfrom fastapi import FastAPI\napp = FastAPI()\n```";
    const REFINED: &str = "```python\nfrom fastapi import FastAPI\napp = FastAPI(title=\"billing\")\n```";
    const TESTS: &str = "```python\nfrom fastapi.testclient import TestClient\ndef test_list(): pass\n```";

    fn happy_llm() -> MockLlmClient {
        let llm = MockLlmClient::new("test-model");
        for text in [SPEC, CODE, REFINED, TESTS] {
            llm.queue_text(text);
        }
        llm
    }

    /// LLM that answers `successes` steps and then fails
    fn llm_failing_after(successes: usize) -> MockLlmClient {
        let llm = MockLlmClient::new("test-model");
        for text in [SPEC, CODE, REFINED, TESTS].into_iter().take(successes) {
            llm.queue_text(text);
        }
        llm.queue_error(LlmError::server_error("Server error: overloaded"));
        llm
    }

    fn started_steps(events: &[PipelineEvent]) -> Vec<Step> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StepStarted { step } => Some(*step),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_mock_llm_client() {
        let mock = MockLlmClient::new("test-model");
        mock.queue_text("Hello");

        let request = LlmRequest {
            system: vec![],
            messages: vec![],
            max_tokens: Some(100),
        };

        let response = mock.complete(&request).await.unwrap();
        assert_eq!(response.text(), "Hello");

        // Second call should fail (no more responses)
        assert!(mock.complete(&request).await.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let rt = TestRuntime::new().llm(happy_llm()).build();
        let (report, events) = rt.run("billing API").await;

        assert!(report.succeeded());
        assert_eq!(report.step, Step::Terminal);
        assert_eq!(report.results.len(), 4);
        assert!(!report.state.from_code_step);

        assert_eq!(
            rt.artifacts.get(API_FILE).as_deref(),
            Some("from fastapi import FastAPI\napp = FastAPI(title=\"billing\")")
        );
        assert_eq!(
            rt.artifacts.get(TESTS_FILE).as_deref(),
            Some("from fastapi.testclient import TestClient\ndef test_list(): pass")
        );
        assert_eq!(rt.artifacts.saves(), 3);
        assert_eq!(report.saved.len(), 3);

        assert_eq!(
            started_steps(&events),
            vec![Step::Spec, Step::Code, Step::Refine, Step::Test]
        );
        assert_eq!(events.last(), Some(&PipelineEvent::Finished { succeeded: true }));

        let names: Vec<_> = report
            .state
            .messages
            .iter()
            .map(|m| m.name.as_deref())
            .collect();
        assert_eq!(
            names,
            vec![
                None,
                Some("create_api_spec_node"),
                Some("create_code_node"),
                Some("create_refinement_node"),
                None,
                Some("create_api_tests_node"),
            ]
        );
    }

    #[tokio::test]
    async fn test_each_write_lands_once_before_its_message() {
        let rt = TestRuntime::new().llm(happy_llm()).build();
        let (_, events) = rt.run("billing API").await;

        let saved: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, PipelineEvent::ArtifactSaved { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(saved.len(), 3);
        assert_eq!(rt.artifacts.saves(), 3);

        // Code, Refine and Test each stream their save right before their message
        for i in saved {
            match &events[i + 1] {
                PipelineEvent::Message { message } => assert_eq!(message.role, Role::Assistant),
                other => panic!("expected a message after the save, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_test_step_sees_refined_code() {
        let rt = TestRuntime::new().llm(happy_llm()).build();
        rt.run("billing API").await;

        let requests = rt.llm.recorded_requests();
        assert_eq!(requests.len(), 4);
        let last = requests[3].messages.last().unwrap();
        assert_eq!(last.role, MessageRole::User);
        assert_eq!(
            last.text,
            "Generate pytest tests for this FastAPI code:\n\nfrom fastapi import FastAPI\napp = FastAPI(title=\"billing\")"
        );
    }

    #[tokio::test]
    async fn test_generation_failure_in_code_step() {
        let rt = TestRuntime::new().llm(llm_failing_after(1)).build();
        let (report, events) = rt.run("billing API").await;

        assert!(!report.succeeded());
        assert_eq!(report.step, Step::Terminal);
        assert_eq!(rt.llm.recorded_requests().len(), 2);
        assert!(rt.artifacts.get(API_FILE).is_none());
        assert_eq!(rt.artifacts.saves(), 0);

        let last = report.state.messages.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.name.as_deref(), Some("create_code_node"));
        assert_eq!(last.content, "Error generating code: Server error: overloaded");
        assert_eq!(report.failure(), Some(last.content.as_str()));
        assert_eq!(events.last(), Some(&PipelineEvent::Finished { succeeded: false }));
    }

    #[tokio::test]
    async fn test_generation_failure_stops_every_step() {
        for successes in 0..4 {
            let rt = TestRuntime::new().llm(llm_failing_after(successes)).build();
            let (report, _) = rt.run("billing API").await;

            assert_eq!(report.step, Step::Terminal);
            assert_eq!(rt.llm.recorded_requests().len(), successes + 1);
            assert!(matches!(
                report.results.last(),
                Some(StepResult::Failure { next: Step::Terminal, .. })
            ));
            assert_eq!(report.results.len(), successes + 1);
        }
    }

    #[tokio::test]
    async fn test_failed_write_discards_step_result() {
        let rt = TestRuntime::new()
            .llm(happy_llm())
            .artifacts(MemoryArtifactStore::new().fail_saves_of(API_FILE))
            .build();
        let (report, events) = rt.run("billing API").await;

        assert!(!report.succeeded());
        assert_eq!(rt.llm.recorded_requests().len(), 2);
        // user input, spec, failure; the code response never made it in
        assert_eq!(report.state.messages.len(), 3);
        let last = report.state.messages.last().unwrap();
        assert_eq!(last.name.as_deref(), Some("create_code_node"));
        assert!(last.content.starts_with("Error generating code: failed to save generated_api.py"));
        assert!(!report.state.from_code_step);
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::ArtifactSaved { .. })));
    }

    #[tokio::test]
    async fn test_read_failure_before_tests() {
        let rt = TestRuntime::new()
            .llm(happy_llm())
            .artifacts(MemoryArtifactStore::new().fail_loads())
            .build();
        let (report, _) = rt.run("billing API").await;

        assert!(!report.succeeded());
        assert_eq!(rt.llm.recorded_requests().len(), 3);
        assert!(rt.artifacts.get(TESTS_FILE).is_none());
        let last = report.state.messages.last().unwrap();
        assert_eq!(last.name.as_deref(), Some("create_api_tests_node"));
        assert!(last
            .content
            .starts_with("Error reading generated API code: failed to read generated_api.py"));
    }

    #[tokio::test]
    async fn test_truncated_code_response_still_reaches_refine() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_text(SPEC);
        llm.queue_text("```python\nfrom fastapi import FastAPI\napp = FastAPI(\n");
        let rt = TestRuntime::new().llm(llm).build();
        let (report, _) = rt.run("billing API").await;

        assert_eq!(
            rt.artifacts.get(API_FILE).as_deref(),
            Some("from fastapi import FastAPI\napp = FastAPI(")
        );
        assert_eq!(rt.artifacts.saves(), 1);
        // The refine request went out; its missing response ends the run
        assert_eq!(rt.llm.recorded_requests().len(), 3);
        assert_eq!(
            report.failure(),
            Some("Error refining code: No mock response queued")
        );
    }

    #[tokio::test]
    async fn test_checkpoints_follow_run() {
        let rt = TestRuntime::new()
            .llm(happy_llm())
            .options(RunOptions {
                thread_id: "thread-9".to_string(),
                retention: CheckpointRetention::Keep,
                max_tokens: Some(2048),
            })
            .build();
        let (report, _) = rt.run("billing API").await;

        let saves = rt.checkpoints.recorded();
        assert!(saves.iter().all(|c| c.thread_id == "thread-9" && c.run_id == report.run_id));
        assert_eq!(saves[0].step, Step::Spec);
        assert_eq!(saves[0].state.messages.len(), 1);
        // Refine is the only step checkpointed with the flag set
        for checkpoint in &saves {
            if checkpoint.state.from_code_step {
                assert_eq!(checkpoint.step, Step::Refine);
            }
        }

        let kept = rt.checkpoints.load("thread-9").await.unwrap().unwrap();
        assert_eq!(kept.step, Step::Terminal);
        assert_eq!(kept.state, report.state);
        assert_eq!(rt.runtime.last_checkpoint().await, Some(kept));

        assert!(rt
            .llm
            .recorded_requests()
            .iter()
            .all(|r| r.max_tokens == Some(2048)));
    }

    #[tokio::test]
    async fn test_discard_retention_clears_checkpoint() {
        let rt = TestRuntime::new().llm(happy_llm()).build();
        rt.run("billing API").await;

        assert!(!rt.checkpoints.recorded().is_empty());
        assert!(rt.checkpoints.load("1").await.unwrap().is_none());
        assert!(rt.runtime.last_checkpoint().await.is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_failures_do_not_fail_run() {
        let rt = TestRuntime::new()
            .llm(happy_llm())
            .checkpoints(RecordingCheckpointStore::failing())
            .build();
        let (report, _) = rt.run("billing API").await;
        assert!(report.succeeded());
    }

    #[tokio::test]
    async fn test_each_run_starts_fresh() {
        let llm = happy_llm();
        for text in [SPEC, CODE, REFINED, TESTS] {
            llm.queue_text(text);
        }
        let rt = TestRuntime::new().llm(llm).build();

        let (first, _) = rt.run("billing API").await;
        let (second, _) = rt.run("recipe API").await;

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(second.state.messages.len(), first.state.messages.len());
        assert_eq!(second.state.messages[0].content, "recipe API");
        assert_eq!(rt.llm.recorded_requests()[4].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_filesystem_run_writes_two_files() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(happy_llm());
        let runtime = PipelineRuntime::new(
            FsArtifactStore::new(dir.path()),
            llm,
            MemoryCheckpointStore::new(),
            RunOptions::default(),
        );

        let (tx, mut rx) = mpsc::channel(64);
        let report = runtime.run("billing API", tx).await.unwrap();
        assert!(report.succeeded());
        while rx.recv().await.is_some() {}

        let mut files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec![API_FILE, TESTS_FILE]);
        for file in files {
            let content = std::fs::read_to_string(dir.path().join(file)).unwrap();
            assert!(!content.trim().is_empty());
        }
    }
}
