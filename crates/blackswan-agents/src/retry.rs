use std::sync::Arc;
use std::time::Duration;

use blackswan_models::{AgentRequest, AgentResponse, RetryConfig};
use tracing::{debug, warn};

use crate::client::ModelClient;
use crate::error::{AgentFailure, ModelError};

/// Bounded exponential backoff for a single agent.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub floor: Duration,
    pub ceiling: Duration,
    /// Decides whether an error is worth another attempt.
    pub retryable: fn(&ModelError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            floor: Duration::from_secs(2),
            ceiling: Duration::from_secs(10),
            retryable: ModelError::is_transient,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            floor: Duration::from_millis(config.backoff_floor_ms),
            ceiling: Duration::from_millis(config.backoff_ceiling_ms),
            ..Self::default()
        }
    }

    /// Sleep before `attempt` (1-based). Zero for the first attempt, then
    /// `min(ceiling, floor * 2^(attempt - 2))`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.floor.saturating_mul(factor).min(self.ceiling)
    }
}

/// Wraps a model client with per-attempt timeouts and retry.
pub struct RetryingCaller {
    client: Arc<dyn ModelClient>,
    policy: RetryPolicy,
}

impl RetryingCaller {
    pub fn new(client: Arc<dyn ModelClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider(&self) -> &str {
        self.client.provider()
    }

    /// Call the model until it succeeds, a permanent error occurs, or the
    /// attempts run out. The last error is reported with the attempt count.
    pub async fn call(
        &self,
        request: &AgentRequest,
        timeout: Duration,
    ) -> Result<AgentResponse, AgentFailure> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(timeout, self.client.call(request, timeout)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ModelError::Timeout(timeout)),
            };

            let err = match outcome {
                Ok(response) => {
                    debug!(role = %request.role, attempt, "Agent call succeeded");
                    return Ok(response);
                }
                Err(err) => err,
            };

            if attempt >= max_attempts || !(self.policy.retryable)(&err) {
                warn!(
                    role = %request.role,
                    provider = self.client.provider(),
                    attempt,
                    kind = %err.kind(),
                    error = %err,
                    "Agent call failed"
                );
                return Err(AgentFailure::from_model_error(request.role, attempt, &err));
            }

            attempt += 1;
            let delay = self.policy.delay_before(attempt);
            warn!(
                role = %request.role,
                provider = self.client.provider(),
                next_attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                kind = %err.kind(),
                error = %err,
                "Retrying agent call"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
