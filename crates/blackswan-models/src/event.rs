use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::severity::Severity;

/// An incoming market/social event produced upstream. Read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: Uuid,
    /// Where the event came from (e.g. "twitter", "reddit", "news").
    pub source: String,
    /// Raw event content as delivered by the source.
    pub content: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// A historically similar event returned by the similarity-search collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarEvent {
    pub event_id: String,
    /// 0.0 to 1.0 similarity to the event under analysis.
    pub similarity_score: f64,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub confidence: f64,
}
