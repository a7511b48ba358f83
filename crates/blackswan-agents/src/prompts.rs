use blackswan_models::{AgentRequest, AgentRole, ChatMessage};

/// Required reply fields shared by every role.
fn response_contract(extra_fields: &str) -> String {
    format!(
        "## OUTPUT\n\n\
         Respond with exactly one JSON object and nothing else. Required fields:\n\
         - `confidence_score`: number 0-1, confidence that this is a genuine black swan\n\
         - `severity`: one of \"low\", \"medium\", \"high\", \"critical\"\n\
         - `risk_factors`: array of strings\n\
         - `recommended_actions`: array of strings (may be empty)\n\
         {extra_fields}"
    )
}

pub fn primary_analysis_system_prompt() -> String {
    format!(
        "You are a senior crypto risk analyst examining a potential black swan event.\n\n\
         Work step by step:\n\
         1. PATTERN RECOGNITION: compare with previous crypto black swans \
         (Terra/Luna, FTX, Mt. Gox).\n\
         2. SENTIMENT: evaluate severity and velocity of sentiment change.\n\
         3. MARKET CORRELATION: relate the event to current market movements.\n\
         4. RISK FACTORS: list the specific risks that make this event notable.\n\
         5. CONFIDENCE: score 0-1 that this is a genuine black swan.\n\
         6. ACTIONS: concrete portfolio protection steps.\n\n\
         {}",
        response_contract(
            "Optional fields: `reasoning` (your step-by-step analysis), \
             `similar_events` (historical parallels)."
        )
    )
}

pub fn sentiment_system_prompt() -> String {
    format!(
        "You analyze the sentiment and emotional impact of crypto events.\n\n\
         Consider sentiment velocity and magnitude, community panic indicators, \
         fear/uncertainty/doubt levels and social media virality potential.\n\n\
         {}",
        response_contract(
            "Role fields: `sentiment_score` (-1 to 1), `velocity` \
             (\"slow\"|\"moderate\"|\"rapid\"|\"explosive\"), `panic_level` (0-10), \
             `virality_score` (0-1), `key_emotions` (array of strings)."
        )
    )
}

pub fn historical_comparison_system_prompt() -> String {
    format!(
        "You compare crypto events against historical black swans.\n\n\
         You receive the current event and a list of similar historical events with \
         similarity scores. Assess pattern similarity, compare market conditions, \
         predict outcomes from history and call out differences that could change them.\n\n\
         {}",
        response_contract(
            "Role fields: `similarity_scores` (object of event_id to 0-1), \
             `most_similar_event` (event id), `predicted_impact` (string)."
        )
    )
}

pub fn market_impact_system_prompt() -> String {
    format!(
        "You assess market vulnerability to black swan events.\n\n\
         Evaluate liquidity conditions, leverage indicators, correlation breakdown risk, \
         cascade failure potential and key support levels at risk.\n\n\
         {}",
        response_contract(
            "Role fields: `liquidity_risk` (\"low\"|\"medium\"|\"high\"|\"critical\"), \
             `leverage_concern` (0-10), `cascade_probability` (0-1), \
             `support_levels` (array of prices)."
        )
    )
}

pub fn system_prompt(role: AgentRole) -> String {
    match role {
        AgentRole::PrimaryAnalysis => primary_analysis_system_prompt(),
        AgentRole::Sentiment => sentiment_system_prompt(),
        AgentRole::HistoricalComparison => historical_comparison_system_prompt(),
        AgentRole::MarketImpact => market_impact_system_prompt(),
    }
}

/// The user-turn payload. Each role only sees the inputs it needs.
pub fn user_payload(request: &AgentRequest) -> serde_json::Value {
    match request.role {
        AgentRole::PrimaryAnalysis => serde_json::json!({
            "current_utc_time": chrono::Utc::now().to_rfc3339(),
            "event": request.event,
            "market_context": request.market,
        }),
        AgentRole::Sentiment => serde_json::json!({
            "event": request.event,
        }),
        AgentRole::HistoricalComparison => serde_json::json!({
            "event": request.event,
            "similar_historical_events": request.similar_events,
        }),
        AgentRole::MarketImpact => serde_json::json!({
            "market_context": request.market,
        }),
    }
}

/// Render the role-tagged messages for one request.
pub fn render_messages(request: &AgentRequest) -> Vec<ChatMessage> {
    let payload = user_payload(request);
    let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
    vec![
        ChatMessage::system(system_prompt(request.role)),
        ChatMessage::user(text),
    ]
}
