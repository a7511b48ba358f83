use blackswan_models::{AgentResponse, AgentRole, Severity};
use serde::Deserialize;

use crate::error::ModelError;

/// Extract the first JSON object from a string that may contain surrounding text.
///
/// Handles common model reply formats:
/// - Clean JSON: `{"key": "value"}`
/// - Markdown-wrapped: ```json\n{"key": "value"}\n```
/// - Prefix text: `Here is the analysis:\n{"key": "value"}`
pub fn extract_json(text: &str) -> Result<String, ModelError> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    if let Some(json_str) = extract_from_markdown_block(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    if let Some(json_str) = extract_first_object(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    Err(ModelError::MalformedResponse(format!(
        "No valid JSON object found in reply (length={})",
        text.len()
    )))
}

/// Extract JSON from a markdown code block (```json ... ``` or ``` ... ```)
fn extract_from_markdown_block(text: &str) -> Option<String> {
    let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for marker in &start_markers {
        if let Some(start) = text.find(marker) {
            let json_start = start + marker.len();
            if let Some(end) = text[json_start..].find("```") {
                return Some(text[json_start..json_start + end].trim().to_string());
            }
        }
    }

    None
}

/// Find the first balanced `{ ... }`, ignoring braces inside string literals.
fn extract_first_object(text: &str) -> Option<String> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(text[s..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    None
}

/// Wire shape every agent must reply with. Anything beyond the required
/// fields is kept as the role-specific payload.
#[derive(Deserialize)]
struct AgentReply {
    confidence_score: f64,
    severity: Severity,
    risk_factors: Vec<String>,
    recommended_actions: Vec<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Strictly decode a raw model reply into an `AgentResponse`.
///
/// Missing or mistyped required fields, an unknown severity, or a confidence
/// outside `[0, 1]` are all `MalformedResponse`; nothing is coerced.
pub fn decode_agent_reply(
    role: AgentRole,
    model: &str,
    raw: &str,
) -> Result<AgentResponse, ModelError> {
    let json_str = extract_json(raw)?;
    let reply: AgentReply = serde_json::from_str(&json_str).map_err(|e| {
        ModelError::MalformedResponse(format!("{role} reply missing required fields: {e}"))
    })?;

    if !reply.confidence_score.is_finite() || !(0.0..=1.0).contains(&reply.confidence_score) {
        return Err(ModelError::MalformedResponse(format!(
            "{role} confidence_score out of range: {}",
            reply.confidence_score
        )));
    }

    Ok(AgentResponse {
        role,
        model: model.to_string(),
        confidence: reply.confidence_score,
        severity: reply.severity,
        risk_factors: reply.risk_factors,
        recommended_actions: reply.recommended_actions,
        extra: reply.extra,
    })
}
