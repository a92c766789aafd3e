//! API tester - turns a plain-language API idea into a FastAPI service
//! and a pytest suite through a four-step LLM pipeline.

mod artifacts;
mod checkpoint;
mod config;
mod llm;
mod prompts;
mod runtime;
mod state_machine;

use artifacts::FsArtifactStore;
use checkpoint::{MemoryCheckpointStore, SqliteCheckpointStore};
use config::AppConfig;
use llm::{LlmConfig, ModelRegistry};
use runtime::{CheckpointStore, PipelineEvent, ProductionRuntime, RegistryLlmClient};
use state_machine::Role;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_tester=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = AppConfig::from_env()?;

    // Initialize LLM registry
    let llm_config = LlmConfig::from_env();
    let llm_registry = Arc::new(ModelRegistry::new(&llm_config));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No LLM API keys configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY.");
    }

    let checkpoints: Arc<dyn CheckpointStore> = match &config.checkpoint_db {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %path.display(), "Opening checkpoint database");
            Arc::new(SqliteCheckpointStore::open(path)?)
        }
        None => Arc::new(MemoryCheckpointStore::new()),
    };

    let llm_client = RegistryLlmClient::new(
        Arc::clone(&llm_registry),
        llm_registry.default_model_id().to_string(),
    );
    let runtime = ProductionRuntime::new(
        FsArtifactStore::new(&config.output_dir),
        llm_client,
        checkpoints,
        config.run_options(),
    );

    if let Some(previous) = runtime.last_checkpoint().await {
        tracing::info!(
            thread_id = %previous.thread_id,
            run_id = %previous.run_id,
            step = %previous.step,
            messages = previous.state.messages.len(),
            updated_at = %previous.updated_at,
            "Found checkpoint from an earlier run"
        );
    }

    println!("Welcome to the API Tester!");
    println!("Type 'quit' to exit.");
    println!("Describe an API and I will write it and generate tests for it.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("User: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("Goodbye!");
            break;
        }

        run_once(&runtime, input).await;
    }

    Ok(())
}

/// Run the pipeline for one input, printing its output as it arrives
async fn run_once(runtime: &ProductionRuntime, input: &str) {
    let (tx, mut rx) = mpsc::channel(32);

    let printer = async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Message { message } if message.role == Role::Assistant => {
                    println!("Assistant: {}", message.content);
                }
                PipelineEvent::ArtifactSaved { path } => println!("Saved {}", path.display()),
                PipelineEvent::StepStarted { step } => {
                    tracing::debug!(step = %step, "Step started");
                }
                PipelineEvent::Message { .. } | PipelineEvent::Finished { .. } => {}
            }
        }
    };

    let (result, ()) = tokio::join!(runtime.run(input, tx), printer);
    match result {
        Ok(report) => tracing::debug!(
            run_id = %report.run_id,
            step = %report.step,
            messages = report.state.messages.len(),
            saved = report.saved.len(),
            "Run finished"
        ),
        Err(e) => {
            tracing::error!(error = %e, "Pipeline run aborted");
            println!("Error: {e}");
        }
    }
}
