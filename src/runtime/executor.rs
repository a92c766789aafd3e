//! Pipeline runtime executor

use super::traits::{ArtifactStore, CheckpointStore, LlmClient};
use super::PipelineEvent;

use crate::checkpoint::{Checkpoint, CheckpointRetention};
use crate::prompts::build_request;
use crate::state_machine::{
    start, transition, Effect, Event, PipelineState, Step, StepError, StepResult, TransitionError,
};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Settings that apply to every run of a runtime
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Scopes checkpointing
    pub thread_id: String,
    pub retention: CheckpointRetention,
    pub max_tokens: Option<u32>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            thread_id: "1".to_string(),
            retention: CheckpointRetention::Discard,
            max_tokens: None,
        }
    }
}

/// Executor-level faults; step failures are not errors at this level
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Run stopped before reaching the end, in {0} step")]
    Stalled(Step),
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub step: Step,
    pub state: PipelineState,
    /// One entry per finished step, in order
    pub results: Vec<StepResult>,
    pub saved: Vec<PathBuf>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.step.is_terminal() && self.results.last().is_some_and(StepResult::is_success)
    }

    /// Message of the failure that ended the run, if any
    pub fn failure(&self) -> Option<&str> {
        match self.results.last() {
            Some(StepResult::Failure { message, .. }) => Some(message.as_str()),
            _ => None,
        }
    }
}

/// Mutable bookkeeping for one run
struct ActiveRun {
    run_id: String,
    step: Step,
    state: PipelineState,
    results: Vec<StepResult>,
    saved: Vec<PathBuf>,
    events: mpsc::Sender<PipelineEvent>,
}

impl ActiveRun {
    async fn emit(&self, event: PipelineEvent) {
        // The driver may stop listening; the run still completes
        let _ = self.events.send(event).await;
    }
}

/// Generic pipeline runtime that can work with any artifact, LLM and checkpoint implementations
pub struct PipelineRuntime<A, L, C>
where
    A: ArtifactStore,
    L: LlmClient,
    C: CheckpointStore,
{
    artifacts: A,
    llm_client: L,
    checkpoints: C,
    options: RunOptions,
}

impl<A, L, C> PipelineRuntime<A, L, C>
where
    A: ArtifactStore,
    L: LlmClient,
    C: CheckpointStore,
{
    pub fn new(artifacts: A, llm_client: L, checkpoints: C, options: RunOptions) -> Self {
        Self {
            artifacts,
            llm_client,
            checkpoints,
            options,
        }
    }

    /// Checkpoint kept for this runtime's thread, if any
    pub async fn last_checkpoint(&self) -> Option<Checkpoint> {
        match self.checkpoints.load(&self.options.thread_id).await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load checkpoint");
                None
            }
        }
    }

    /// Run the whole pipeline for one user input.
    ///
    /// Step failures end the run normally and show up in the report; only
    /// executor faults are returned as errors. `events` is dropped when the
    /// run returns, which closes the stream for the driver.
    pub async fn run(
        &self,
        input: &str,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Result<RunReport, RuntimeError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "run",
            run_id = %run_id,
            thread_id = %self.options.thread_id
        );
        self.drive(run_id, input, events).instrument(span).await
    }

    async fn drive(
        &self,
        run_id: String,
        input: &str,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Result<RunReport, RuntimeError> {
        tracing::info!(model = self.llm_client.model_id(), "Starting pipeline run");

        let started = start(input);
        let mut run = ActiveRun {
            run_id,
            step: started.step,
            state: started.state,
            results: Vec::new(),
            saved: Vec::new(),
            events,
        };

        let mut pending = self.perform_all(started.effects, &mut run).await;

        while let Some(event) = pending.take() {
            let result = transition(&run.state, run.step, event)?;

            // Writes must land before the transition commits
            let (writes, effects): (Vec<Effect>, Vec<Effect>) =
                result.effects.into_iter().partition(Effect::is_persistence);
            let saved = match self.write_all(writes).await {
                Ok(saved) => saved,
                Err(error) => {
                    tracing::warn!(step = %run.step, error = %error, "Discarding step result");
                    pending = Some(Event::failed(error));
                    continue;
                }
            };

            if result.step != run.step {
                tracing::info!(from = %run.step, to = %result.step, "Step transition");
            }
            run.step = result.step;
            run.state = result.state;
            if let Some(step_result) = result.step_result {
                run.results.push(step_result);
            }
            for path in saved {
                run.emit(PipelineEvent::ArtifactSaved { path: path.clone() }).await;
                run.saved.push(path);
            }

            pending = self.perform_all(effects, &mut run).await;
        }

        if !run.step.is_terminal() {
            return Err(RuntimeError::Stalled(run.step));
        }

        self.finish(&run).await;

        let ActiveRun {
            run_id,
            step,
            state,
            results,
            saved,
            events,
        } = run;
        let report = RunReport {
            run_id,
            step,
            state,
            results,
            saved,
        };
        match report.failure() {
            None => tracing::info!(saved = report.saved.len(), "Pipeline run completed"),
            Some(message) => tracing::warn!(failure = %message, "Pipeline run failed"),
        }
        let _ = events
            .send(PipelineEvent::Finished {
                succeeded: report.succeeded(),
            })
            .await;
        Ok(report)
    }

    async fn write_all(&self, writes: Vec<Effect>) -> Result<Vec<PathBuf>, StepError> {
        let mut saved = Vec::with_capacity(writes.len());
        for effect in writes {
            if let Effect::PersistArtifact { filename, content } = effect {
                let path = self.artifacts.save(&content, &filename).await.map_err(|e| {
                    tracing::error!(filename = %filename, error = %e, "Failed to save artifact");
                    StepError::Persistence {
                        filename: filename.clone(),
                        message: e.to_string(),
                    }
                })?;
                saved.push(path);
            }
        }
        Ok(saved)
    }

    /// Perform non-write effects; returns the event that drives the next transition.
    async fn perform_all(&self, effects: Vec<Effect>, run: &mut ActiveRun) -> Option<Event> {
        let mut next = None;
        for effect in effects {
            if let Some(event) = self.perform(effect, run).await {
                next = Some(event);
            }
        }
        next
    }

    async fn perform(&self, effect: Effect, run: &mut ActiveRun) -> Option<Event> {
        match effect {
            Effect::Notify { message } => {
                run.emit(PipelineEvent::Message { message }).await;
                None
            }

            Effect::Checkpoint => {
                let checkpoint =
                    Checkpoint::new(&self.options.thread_id, &run.run_id, run.step, &run.state);
                if let Err(e) = self.checkpoints.save(&checkpoint).await {
                    tracing::error!(error = %e, "Failed to save checkpoint");
                }
                None
            }

            Effect::RequestGeneration { step } => {
                run.emit(PipelineEvent::StepStarted { step }).await;
                let request = build_request(step, &run.state, self.options.max_tokens);
                tracing::debug!(
                    step = %step,
                    messages = request.messages.len(),
                    "Requesting generation"
                );
                match self.llm_client.complete(&request).await {
                    Ok(response) => Some(Event::Generated {
                        content: response.text(),
                    }),
                    Err(e) => Some(Event::failed(StepError::Generation(e.message))),
                }
            }

            Effect::LoadArtifact { filename } => {
                match self.artifacts.load(&filename).await {
                    Ok(content) => Some(Event::ArtifactLoaded { filename, content }),
                    Err(e) => {
                        tracing::error!(
                            filename = %filename,
                            error = %e,
                            "Failed to read artifact"
                        );
                        Some(Event::failed(StepError::Read {
                            filename,
                            message: e.to_string(),
                        }))
                    }
                }
            }

            // Writes only happen in write_all, ahead of the commit
            Effect::PersistArtifact { filename, .. } => {
                tracing::warn!(filename = %filename, "Skipping write outside a commit");
                None
            }
        }
    }

    /// Apply the checkpoint retention policy once the run has ended
    async fn finish(&self, run: &ActiveRun) {
        if self.options.retention == CheckpointRetention::Discard {
            if let Err(e) = self.checkpoints.discard(&self.options.thread_id).await {
                tracing::error!(error = %e, "Failed to discard checkpoint");
            }
        } else {
            tracing::debug!(step = %run.step, "Keeping checkpoint");
        }
    }
}
