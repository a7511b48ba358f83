pub mod agent;
pub mod claude_cli;
pub mod client;
pub mod error;
pub mod metrics;
pub mod ollama;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod retry;
pub mod synthesizer;

pub mod test_support;

pub use agent::Agent;
pub use claude_cli::ClaudeCliClient;
pub use client::ModelClient;
pub use error::{AgentFailure, AnalysisError, FailureKind, ModelError};
pub use metrics::{CallStatus, MetricsRecorder, MetricsSink, TracingMetrics};
pub use ollama::OllamaClient;
pub use orchestrator::{Orchestrator, OrchestratorSettings, MIN_QUORUM};
pub use retry::{RetryPolicy, RetryingCaller};
pub use synthesizer::synthesize;
