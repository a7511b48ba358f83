use std::sync::Mutex;
use std::time::Duration;

use blackswan_models::AgentRole;
use tracing::info;

use crate::error::FailureKind;

/// Outcome label attached to each agent call observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallStatus {
    Success,
    Failed(FailureKind),
}

impl CallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Failed(kind) => kind.as_str(),
        }
    }
}

/// Receiver for orchestration metrics.
pub trait MetricsSink: Send + Sync {
    /// One observation per agent per analysis, after retries.
    fn agent_call(&self, role: AgentRole, status: CallStatus, latency: Duration);

    /// Confidence spread of each synthesized consensus.
    fn consensus_variance(&self, value: f64);
}

/// Emits metrics as structured tracing events under `blackswan::metrics`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn agent_call(&self, role: AgentRole, status: CallStatus, latency: Duration) {
        info!(
            target: "blackswan::metrics",
            metric = "agent_call",
            role = %role,
            status = status.as_str(),
            latency_ms = latency.as_millis() as u64,
        );
    }

    fn consensus_variance(&self, value: f64) {
        info!(target: "blackswan::metrics", metric = "consensus_variance", value);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentCallRecord {
    pub role: AgentRole,
    pub status: CallStatus,
    pub latency: Duration,
}

/// In-memory sink that keeps every observation.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    calls: Mutex<Vec<AgentCallRecord>>,
    variances: Mutex<Vec<f64>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AgentCallRecord> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn variances(&self) -> Vec<f64> {
        self.variances.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Number of calls recorded with the given status label.
    pub fn count(&self, status: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.status.as_str() == status)
            .count()
    }
}

impl MetricsSink for MetricsRecorder {
    fn agent_call(&self, role: AgentRole, status: CallStatus, latency: Duration) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(AgentCallRecord {
                role,
                status,
                latency,
            });
        }
    }

    fn consensus_variance(&self, value: f64) {
        if let Ok(mut variances) = self.variances.lock() {
            variances.push(value);
        }
    }
}
