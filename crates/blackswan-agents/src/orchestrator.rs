use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use blackswan_cache::ResultStore;
use blackswan_models::{
    AgentResponse, AgentRole, AnalysisRequest, AnalysisResult, Fingerprint, SwanConfig,
};
use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agent::Agent;
use crate::error::{AgentFailure, AnalysisError, FailureKind};
use crate::metrics::{CallStatus, MetricsSink, TracingMetrics};
use crate::synthesizer::synthesize;

/// Fewest successful agents a consensus may ever be built from.
pub const MIN_QUORUM: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Minimum successful agents required to synthesize. Never below
    /// [`MIN_QUORUM`].
    pub min_quorum: usize,
    pub cache_ttl: Duration,
    pub top_actions: usize,
    pub similar_events_limit: usize,
    /// Deadline for the whole analysis. None = wait for every agent.
    pub total_timeout: Option<Duration>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            min_quorum: 2,
            cache_ttl: Duration::from_secs(3600),
            top_actions: 5,
            similar_events_limit: 5,
            total_timeout: None,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &SwanConfig) -> Self {
        Self {
            min_quorum: config.orchestrator.min_quorum,
            cache_ttl: Duration::from_secs(config.cache.ttl_seconds),
            top_actions: config.orchestrator.top_actions,
            similar_events_limit: config.orchestrator.similar_events_limit,
            total_timeout: config.orchestrator.total_timeout_seconds.map(Duration::from_secs),
        }
    }
}

type AgentOutcome = (AgentRole, Result<AgentResponse, AgentFailure>, Duration);

enum Step {
    Joined(Option<Result<AgentOutcome, tokio::task::JoinError>>),
    Cancelled,
    DeadlineReached,
}

/// The orchestrator fans an event out to the agent roster and synthesizes
/// a consensus from whichever agents succeed.
pub struct Orchestrator {
    agents: Vec<Arc<Agent>>,
    cache: Arc<dyn ResultStore>,
    metrics: Arc<dyn MetricsSink>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        agents: Vec<Arc<Agent>>,
        cache: Arc<dyn ResultStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            agents,
            cache,
            metrics: Arc::new(TracingMetrics),
            settings,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<dyn ResultStore> {
        &self.cache
    }

    pub fn roster(&self) -> Vec<AgentRole> {
        self.agents.iter().map(|a| a.role()).collect()
    }

    /// Analyze an event, returning a cached consensus when one is live.
    pub async fn analyze(&self, input: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_until_cancelled(input, &CancellationToken::new())
            .await
    }

    /// Like [`Orchestrator::analyze`], but stops when `cancel` fires. Every
    /// in-flight agent task is aborted and awaited before returning, and
    /// nothing is cached.
    pub async fn analyze_until_cancelled(
        &self,
        input: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let start = Instant::now();
        let fingerprint = Fingerprint::compute(&input.event, &input.market_context);
        info!(
            event_id = %input.event.id,
            source = %input.event.source,
            fingerprint = fingerprint.short(),
            "Starting analysis"
        );

        match self.cache.get(&fingerprint).await {
            Ok(Some(cached)) => {
                info!(fingerprint = fingerprint.short(), "Cache hit");
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Cache unavailable on read, treating as miss");
            }
        }

        let (responses, failures) = self.fan_out(input, cancel, start).await?;

        let dispatched = self.agents.len();
        let required = self.settings.min_quorum.max(MIN_QUORUM);
        if responses.len() < required {
            warn!(
                succeeded = responses.len(),
                required,
                dispatched,
                "Insufficient consensus"
            );
            return Err(AnalysisError::InsufficientConsensus {
                succeeded: responses.len(),
                required,
                dispatched,
                failures,
            });
        }

        let result = synthesize(
            input.event.id,
            &responses,
            self.settings.top_actions,
            Utc::now(),
        );
        self.metrics.consensus_variance(result.confidence_variance);

        if let Err(e) = self
            .cache
            .set(&fingerprint, &result, self.settings.cache_ttl)
            .await
        {
            warn!(error = %e, "Cache unavailable on write, result not cached");
        }

        info!(
            event_id = %input.event.id,
            severity = %result.severity,
            confidence = result.confidence_score,
            variance = result.confidence_variance,
            agents = responses.len(),
            failed = failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(result)
    }

    /// Run every agent concurrently and collect results in completion order.
    /// No agent is cut short because a peer failed.
    async fn fan_out(
        &self,
        input: &AnalysisRequest,
        cancel: &CancellationToken,
        start: Instant,
    ) -> Result<(Vec<AgentResponse>, Vec<AgentFailure>), AnalysisError> {
        let shared = Arc::new(input.clone());
        let similar_limit = self.settings.similar_events_limit;
        let mut tasks: JoinSet<AgentOutcome> = JoinSet::new();

        for agent in &self.agents {
            let agent = Arc::clone(agent);
            let input = Arc::clone(&shared);
            tasks.spawn(async move {
                let agent_start = Instant::now();
                let result = agent.run(&input, similar_limit).await;
                (agent.role(), result, agent_start.elapsed())
            });
        }

        let deadline = self.settings.total_timeout.map(|d| (d, start + d));
        let deadline_reached = async {
            match deadline {
                Some((_, at)) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline_reached);

        let mut responses = Vec::new();
        let mut failures = Vec::new();
        let mut reported: HashSet<AgentRole> = HashSet::new();

        loop {
            let step = tokio::select! {
                joined = tasks.join_next() => Step::Joined(joined),
                _ = cancel.cancelled() => Step::Cancelled,
                _ = &mut deadline_reached => Step::DeadlineReached,
            };

            let joined = match step {
                Step::Joined(joined) => joined,
                Step::Cancelled => {
                    warn!(in_flight = tasks.len(), "Analysis cancelled, aborting agents");
                    tasks.shutdown().await;
                    return Err(AnalysisError::Cancelled);
                }
                Step::DeadlineReached => {
                    warn!(in_flight = tasks.len(), "Analysis deadline reached, aborting agents");
                    tasks.shutdown().await;
                    let limit = deadline.map(|(d, _)| d).unwrap_or_default();
                    return Err(AnalysisError::DeadlineExceeded(limit));
                }
            };

            let Some(joined) = joined else { break };
            match joined {
                Ok((role, Ok(response), elapsed)) => {
                    info!(
                        role = %role,
                        confidence = response.confidence,
                        severity = %response.severity,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Agent succeeded"
                    );
                    self.metrics.agent_call(role, CallStatus::Success, elapsed);
                    reported.insert(role);
                    responses.push(response);
                }
                Ok((role, Err(failure), elapsed)) => {
                    warn!(
                        role = %role,
                        kind = %failure.kind,
                        attempts = failure.attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Agent did not contribute"
                    );
                    self.metrics
                        .agent_call(role, CallStatus::Failed(failure.kind), elapsed);
                    reported.insert(role);
                    failures.push(failure);
                }
                Err(e) => {
                    error!(error = %e, "Agent task panicked");
                }
            }
        }

        // Tasks that died without reporting. Logged only; the metrics sink
        // sees model call outcomes.
        for agent in &self.agents {
            if !reported.contains(&agent.role()) {
                error!(
                    role = %agent.role(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Agent task ended without a result"
                );
                failures.push(AgentFailure {
                    role: agent.role(),
                    kind: FailureKind::TaskFailed,
                    attempts: 0,
                    message: "agent task ended without a result".to_string(),
                });
            }
        }

        Ok((responses, failures))
    }
}
