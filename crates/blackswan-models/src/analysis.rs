use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent_message::AgentRole;
use crate::event::{Event, SimilarEvent};
use crate::market::MarketContext;
use crate::severity::Severity;

pub const OUTPUT_SCHEMA_VERSION: u32 = 1;

/// Input to one analysis: the event, its market snapshot and similar history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    pub event: Event,
    pub market_context: MarketContext,
    #[serde(default)]
    pub similar_events: Vec<SimilarEvent>,
}

/// The synthesized consensus for one event. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub schema_version: u32,
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Mean of the agents' confidence scores.
    pub confidence_score: f64,
    /// Population standard deviation of the agents' confidence scores.
    pub confidence_variance: f64,
    pub severity: Severity,
    pub risk_factors: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub requires_human_review: bool,
    pub reasoning: ConsensusReasoning,
    pub sentiment_analysis: Option<serde_json::Value>,
    pub market_impact: Option<serde_json::Value>,
    pub historical_similarity: Option<serde_json::Value>,
}

/// Qualitative agreement between agents, derived from the confidence spread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusLevel {
    High,
    Medium,
    Low,
}

/// Audit trail of how the consensus was reached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsensusReasoning {
    pub agent_count: usize,
    pub consensus_level: ConsensusLevel,
    /// Mean severity ordinal (low=1 .. critical=4) before bucketing.
    pub mean_severity_ordinal: f64,
    pub contributions: Vec<AgentContribution>,
}

/// One agent's contribution to the consensus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentContribution {
    pub role: AgentRole,
    pub model: String,
    pub confidence: f64,
    pub severity: Severity,
    /// The agent's role-specific structured payload, verbatim.
    pub payload: serde_json::Value,
}
