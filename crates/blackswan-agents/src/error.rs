use std::fmt;
use std::time::Duration;

use blackswan_models::AgentRole;
use thiserror::Error;

/// Classified failure of a single model call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider rejected request: {0}")]
    ProviderRejected(String),
}

impl ModelError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ModelError::Timeout(_) => FailureKind::Timeout,
            ModelError::Transport(_) => FailureKind::Transport,
            ModelError::MalformedResponse(_) => FailureKind::Malformed,
            ModelError::ProviderRejected(_) => FailureKind::ProviderRejected,
        }
    }

    /// Timeouts, transport errors and malformed replies are worth another attempt.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ModelError::ProviderRejected(_))
    }
}

/// Failure classification, kept distinct for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    Transport,
    Malformed,
    ProviderRejected,
    /// The agent task panicked or was aborted before reporting.
    TaskFailed,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Transport => "transport_error",
            FailureKind::Malformed => "malformed",
            FailureKind::ProviderRejected => "provider_rejected",
            FailureKind::TaskFailed => "task_failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An agent that did not contribute to the consensus.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentFailure {
    pub role: AgentRole,
    pub kind: FailureKind,
    /// Attempts made before giving up.
    pub attempts: u32,
    pub message: String,
}

impl AgentFailure {
    pub fn from_model_error(role: AgentRole, attempts: u32, error: &ModelError) -> Self {
        Self {
            role,
            kind: error.kind(),
            attempts,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for AgentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} after {} attempt(s) ({})",
            self.role, self.kind, self.attempts, self.message
        )
    }
}

fn describe(failures: &[AgentFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(
        "Insufficient consensus: {succeeded} of {dispatched} agents succeeded, {required} required [{}]",
        describe(.failures)
    )]
    InsufficientConsensus {
        succeeded: usize,
        required: usize,
        dispatched: usize,
        failures: Vec<AgentFailure>,
    },

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Analysis exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
}
