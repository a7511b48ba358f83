use std::collections::{HashMap, HashSet};

use blackswan_models::{
    AgentContribution, AgentResponse, AgentRole, AnalysisResult, ConsensusLevel,
    ConsensusReasoning, Severity, OUTPUT_SCHEMA_VERSION,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Confidence spread above which a human must review the verdict.
pub const REVIEW_VARIANCE_THRESHOLD: f64 = 0.3;
/// Mean confidence below which a human must review the verdict.
pub const REVIEW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Turn the successful agent responses of one analysis into a consensus.
///
/// Pure: no I/O, no clock. The orchestrator only calls this once quorum is
/// met, but an empty slice still yields a low-severity result flagged for
/// review. Risk factors and action tie-breaks follow the slice order.
pub fn synthesize(
    event_id: Uuid,
    responses: &[AgentResponse],
    top_actions: usize,
    decided_at: DateTime<Utc>,
) -> AnalysisResult {
    let confidences: Vec<f64> = responses.iter().map(|r| r.confidence).collect();
    let (mean, std_dev) = mean_and_population_std(&confidences);

    let ordinal_sum: u32 = responses.iter().map(|r| r.severity.ordinal()).sum();
    let severity = bucket_severity(ordinal_sum, responses.len());
    let mean_severity_ordinal = if responses.is_empty() {
        0.0
    } else {
        ordinal_sum as f64 / responses.len() as f64
    };

    AnalysisResult {
        id: Uuid::new_v4(),
        schema_version: OUTPUT_SCHEMA_VERSION,
        event_id,
        timestamp: decided_at,
        confidence_score: mean,
        confidence_variance: std_dev,
        severity,
        risk_factors: merge_risk_factors(responses),
        recommended_actions: rank_actions(responses, top_actions),
        requires_human_review: std_dev > REVIEW_VARIANCE_THRESHOLD
            || mean < REVIEW_CONFIDENCE_THRESHOLD,
        reasoning: ConsensusReasoning {
            agent_count: responses.len(),
            consensus_level: consensus_level(std_dev),
            mean_severity_ordinal,
            contributions: responses.iter().map(contribution).collect(),
        },
        sentiment_analysis: role_payload(responses, AgentRole::Sentiment),
        market_impact: role_payload(responses, AgentRole::MarketImpact),
        historical_similarity: role_payload(responses, AgentRole::HistoricalComparison),
    }
}

fn mean_and_population_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Bucket the mean ordinal with exact boundaries: mean >= 3.5 is critical,
/// >= 2.5 high, >= 1.5 medium. Compared as `2 * sum >= 7 * n` etc. so a mean
/// sitting exactly on a boundary always rounds up.
fn bucket_severity(ordinal_sum: u32, count: usize) -> Severity {
    let doubled = u64::from(ordinal_sum) * 2;
    let n = count as u64;
    if n == 0 {
        Severity::Low
    } else if doubled >= 7 * n {
        Severity::Critical
    } else if doubled >= 5 * n {
        Severity::High
    } else if doubled >= 3 * n {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn consensus_level(std_dev: f64) -> ConsensusLevel {
    if std_dev < 0.1 {
        ConsensusLevel::High
    } else if std_dev < 0.2 {
        ConsensusLevel::Medium
    } else {
        ConsensusLevel::Low
    }
}

fn merge_risk_factors(responses: &[AgentResponse]) -> Vec<String> {
    let mut seen = HashSet::new();
    responses
        .iter()
        .flat_map(|r| r.risk_factors.iter())
        .filter(|factor| seen.insert(factor.as_str()))
        .cloned()
        .collect()
}

fn rank_actions(responses: &[AgentResponse], top: usize) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for action in responses.iter().flat_map(|r| r.recommended_actions.iter()) {
        let count = counts.entry(action.as_str()).or_insert(0);
        if *count == 0 {
            order.push(action.as_str());
        }
        *count += 1;
    }

    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.into_iter().take(top).map(str::to_string).collect()
}

fn contribution(response: &AgentResponse) -> AgentContribution {
    let mut payload = response.extra.clone();
    payload.insert(
        "risk_factors".to_string(),
        serde_json::json!(response.risk_factors),
    );
    payload.insert(
        "recommended_actions".to_string(),
        serde_json::json!(response.recommended_actions),
    );

    AgentContribution {
        role: response.role,
        model: response.model.clone(),
        confidence: response.confidence,
        severity: response.severity,
        payload: serde_json::Value::Object(payload),
    }
}

fn role_payload(responses: &[AgentResponse], role: AgentRole) -> Option<serde_json::Value> {
    responses
        .iter()
        .find(|r| r.role == role)
        .map(|r| serde_json::Value::Object(r.extra.clone()))
}
