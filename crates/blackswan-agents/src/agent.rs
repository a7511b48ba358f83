use std::time::Duration;

use blackswan_models::{
    AgentRequest, AgentResponse, AgentRole, AnalysisRequest, ModelParams,
};
use uuid::Uuid;

use crate::error::AgentFailure;
use crate::retry::RetryingCaller;

/// One member of the roster: a role bound to a model and a provider.
pub struct Agent {
    role: AgentRole,
    params: ModelParams,
    caller: RetryingCaller,
    /// Per-attempt timeout.
    timeout: Duration,
}

impl Agent {
    pub fn new(
        role: AgentRole,
        params: ModelParams,
        caller: RetryingCaller,
        timeout: Duration,
    ) -> Self {
        Self {
            role,
            params,
            caller,
            timeout,
        }
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn provider(&self) -> &str {
        self.caller.provider()
    }

    /// Only the historical-comparison agent sees similar events, and only
    /// the first `similar_limit` of them.
    pub fn build_request(&self, input: &AnalysisRequest, similar_limit: usize) -> AgentRequest {
        let similar_events = if self.role == AgentRole::HistoricalComparison {
            input
                .similar_events
                .iter()
                .take(similar_limit)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        AgentRequest {
            request_id: Uuid::new_v4(),
            role: self.role,
            params: self.params.clone(),
            event: input.event.clone(),
            market: input.market_context.clone(),
            similar_events,
        }
    }

    pub async fn run(
        &self,
        input: &AnalysisRequest,
        similar_limit: usize,
    ) -> Result<AgentResponse, AgentFailure> {
        let request = self.build_request(input, similar_limit);
        self.caller.call(&request, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::test_support::{analysis_request, ScriptedClient};
    use std::sync::Arc;

    fn agent(role: AgentRole) -> Agent {
        Agent::new(
            role,
            ModelParams {
                model: "llama3.1".to_string(),
                temperature: 0.1,
                max_tokens: 500,
            },
            RetryingCaller::new(
                Arc::new(ScriptedClient::succeeding(role, 0.5, blackswan_models::Severity::Low)),
                RetryPolicy::default(),
            ),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn only_historical_agent_gets_similar_events() {
        let input = analysis_request(8);

        let historical = agent(AgentRole::HistoricalComparison).build_request(&input, 5);
        assert_eq!(historical.similar_events.len(), 5);
        assert_eq!(historical.similar_events[0].event_id, "similar-0");

        let sentiment = agent(AgentRole::Sentiment).build_request(&input, 5);
        assert!(sentiment.similar_events.is_empty());
        assert_eq!(sentiment.params.temperature, 0.1);
        assert_eq!(sentiment.event.id, input.event.id);
    }

    #[tokio::test]
    async fn run_returns_client_response() {
        let input = analysis_request(0);
        let response = agent(AgentRole::MarketImpact).run(&input, 5).await.unwrap();
        assert_eq!(response.role, AgentRole::MarketImpact);
    }
}
