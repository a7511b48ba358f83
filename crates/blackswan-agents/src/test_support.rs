//! Scripted model clients and fixtures for exercising the orchestrator
//! without a live provider.
//!
//! `ScriptedClient` plays back a list of steps, one per call. Once the script
//! runs out the last step repeats, so a single-step script behaves like a
//! client that always answers the same way.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use blackswan_cache::{CacheError, ResultStore};
use blackswan_models::{
    AgentRequest, AgentResponse, AgentRole, AnalysisRequest, AnalysisResult, Event, Fingerprint,
    MarketContext, ModelParams, Severity, SimilarEvent,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::client::ModelClient;
use crate::error::ModelError;

/// One scripted reaction to a call.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(Result<AgentResponse, ModelError>),
    /// Sleep, then respond.
    Delay(Duration, Result<AgentResponse, ModelError>),
    /// Never return.
    Hang,
    Panic,
}

pub struct ScriptedClient {
    steps: Vec<Step>,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight counter when the call future is dropped,
/// whether it completed or was aborted.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedClient {
    pub fn new(outcomes: Vec<Result<AgentResponse, ModelError>>) -> Self {
        Self::with_steps(outcomes.into_iter().map(Step::Respond).collect())
    }

    pub fn with_steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn succeeding(role: AgentRole, confidence: f64, severity: Severity) -> Self {
        Self::new(vec![Ok(response(role, confidence, severity))])
    }

    pub fn failing(error: ModelError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn hanging() -> Self {
        Self::with_steps(vec![Step::Hang])
    }

    /// Calls started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls started but not yet finished or dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn call(
        &self,
        _request: &AgentRequest,
        _timeout: Duration,
    ) -> Result<AgentResponse, ModelError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        let step = self
            .steps
            .get(index)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap_or(Step::Hang);

        match step {
            Step::Respond(outcome) => outcome,
            Step::Delay(delay, outcome) => {
                tokio::time::sleep(delay).await;
                outcome
            }
            Step::Hang => std::future::pending().await,
            Step::Panic => panic!("scripted client panic"),
        }
    }
}

/// A store whose backend is always down.
#[derive(Debug, Default)]
pub struct FailingStore {
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

#[async_trait]
impl ResultStore for FailingStore {
    async fn get(&self, _key: &Fingerprint) -> Result<Option<AnalysisResult>, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("backend down".to_string()))
    }

    async fn set(
        &self,
        _key: &Fingerprint,
        _result: &AnalysisResult,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("backend down".to_string()))
    }

    async fn delete(&self, _key: &Fingerprint) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("backend down".to_string()))
    }

    async fn cleanup_expired(&self) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("backend down".to_string()))
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("backend down".to_string()))
    }
}

/// Records every request it receives, then answers like `succeeding`.
pub struct RecordingClient {
    reply: AgentResponse,
    requests: Mutex<Vec<AgentRequest>>,
}

impl RecordingClient {
    pub fn new(reply: AgentResponse) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for RecordingClient {
    fn provider(&self) -> &str {
        "recording"
    }

    async fn call(
        &self,
        request: &AgentRequest,
        _timeout: Duration,
    ) -> Result<AgentResponse, ModelError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        Ok(self.reply.clone())
    }
}

pub fn response(role: AgentRole, confidence: f64, severity: Severity) -> AgentResponse {
    AgentResponse {
        role,
        model: "scripted-model".to_string(),
        confidence,
        severity,
        risk_factors: vec![format!("{role} risk")],
        recommended_actions: vec!["Reduce leverage".to_string()],
        extra: serde_json::Map::new(),
    }
}

fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn sample_event() -> Event {
    let mut content = serde_json::Map::new();
    content.insert(
        "text".to_string(),
        serde_json::json!("Major exchange halts all withdrawals"),
    );
    content.insert("retweets".to_string(), serde_json::json!(12_000));

    Event {
        id: Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440000),
        source: "twitter".to_string(),
        content,
        timestamp: at(2024, 3, 1, 12),
        metadata: None,
    }
}

pub fn sample_market() -> MarketContext {
    MarketContext {
        btc_price: Decimal::new(58_000, 0),
        eth_price: Some(Decimal::new(3_200, 0)),
        total_market_cap: Decimal::new(2_100_000_000_000, 0),
        btc_dominance: Some(Decimal::new(525, 1)),
        fear_greed_index: Some(22),
        volume_24h: Some(Decimal::new(85_000_000_000, 0)),
        timestamp: at(2024, 3, 1, 12),
    }
}

pub fn similar_event(id: &str, score: f64) -> SimilarEvent {
    SimilarEvent {
        event_id: id.to_string(),
        similarity_score: score,
        timestamp: at(2022, 11, 8, 0),
        severity: Severity::Critical,
        confidence: 0.9,
    }
}

/// An analysis request carrying `similar` similar events named
/// `similar-0`, `similar-1`, ...
pub fn analysis_request(similar: usize) -> AnalysisRequest {
    AnalysisRequest {
        event: sample_event(),
        market_context: sample_market(),
        similar_events: (0..similar)
            .map(|i| similar_event(&format!("similar-{i}"), 0.9 - i as f64 * 0.05))
            .collect(),
    }
}

pub fn agent_request(role: AgentRole) -> AgentRequest {
    AgentRequest {
        request_id: Uuid::new_v4(),
        role,
        params: ModelParams {
            model: "llama3.1".to_string(),
            temperature: 0.1,
            max_tokens: 500,
        },
        event: sample_event(),
        market: sample_market(),
        similar_events: Vec::new(),
    }
}
