use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{Event, SimilarEvent};
use crate::market::MarketContext;
use crate::severity::Severity;

/// The fixed roster of analysis roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    PrimaryAnalysis,
    Sentiment,
    HistoricalComparison,
    MarketImpact,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::PrimaryAnalysis,
        AgentRole::Sentiment,
        AgentRole::HistoricalComparison,
        AgentRole::MarketImpact,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::PrimaryAnalysis => "primary_analysis",
            AgentRole::Sentiment => "sentiment",
            AgentRole::HistoricalComparison => "historical_comparison",
            AgentRole::MarketImpact => "market_impact",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model parameters for one agent call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelParams {
    pub model: String,
    /// 0.0 to 1.0 sampling temperature.
    pub temperature: f64,
    pub max_tokens: u32,
}

/// A role-tagged message handed to a model provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One agent's unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRequest {
    pub request_id: Uuid,
    pub role: AgentRole,
    pub params: ModelParams,
    pub event: Event,
    pub market: MarketContext,
    /// Only populated for the historical-comparison role.
    #[serde(default)]
    pub similar_events: Vec<SimilarEvent>,
}

/// Structured result of one successful agent call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    pub role: AgentRole,
    /// Model that produced the reply.
    pub model: String,
    /// 0.0 to 1.0 confidence that the event is a genuine black swan.
    pub confidence: f64,
    pub severity: Severity,
    pub risk_factors: Vec<String>,
    pub recommended_actions: Vec<String>,
    /// Role-specific fields (sentiment, market impact, historical similarity).
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
