use serde::{Deserialize, Serialize};

use crate::agent_message::{AgentRole, ModelParams};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SwanConfig {
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub orchestrator: OrchestratorConfig,
    pub providers: ProvidersConfig,
    pub agents: Vec<AgentConfig>,
}

impl SwanConfig {
    /// Agents that will actually be dispatched. Falls back to the default
    /// roster when the config lists none.
    pub fn enabled_agents(&self) -> Vec<AgentConfig> {
        let agents = if self.agents.is_empty() {
            default_roster()
        } else {
            self.agents.clone()
        };
        agents.into_iter().filter(|a| a.enabled).collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Configuration for the analysis result cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Path to the SQLite file when `backend = "sqlite"`.
    pub sqlite_path: String,
    /// Maximum number of cached results before LRU eviction.
    pub max_entries: usize,
    /// Lifetime of a cached result, measured from insertion.
    pub ttl_seconds: u64,
    /// Interval between expiry sweeps in long-running modes.
    pub cleanup_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            sqlite_path: "data/blackswan_cache.db".to_string(),
            max_entries: 1000,
            ttl_seconds: 3600,
            cleanup_interval_seconds: 300,
        }
    }
}

/// Per-agent retry policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub backoff_floor_ms: u64,
    pub backoff_ceiling_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_floor_ms: 2_000,
            backoff_ceiling_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Minimum successful agents required to synthesize a consensus.
    pub min_quorum: usize,
    /// Number of recommended actions kept in the consensus.
    pub top_actions: usize,
    /// Similar events forwarded to the historical-comparison agent.
    pub similar_events_limit: usize,
    /// Per-attempt timeout for a single agent call.
    pub agent_timeout_seconds: u64,
    /// Deadline for a whole analysis. None = wait for every agent.
    pub total_timeout_seconds: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_quorum: 2,
            top_actions: 5,
            similar_events_limit: 5,
            agent_timeout_seconds: 30,
            total_timeout_seconds: Some(180),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub ollama_url: String,
    /// Executable used for the `claude_cli` provider.
    pub claude_binary: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            claude_binary: "claude".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    ClaudeCli,
    Ollama,
}

/// Configuration for a single agent in the roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub role: AgentRole,
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AgentConfig {
    pub fn params(&self) -> ModelParams {
        ModelParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

fn default_true() -> bool {
    true
}

/// The four-role roster used when no agents are configured.
pub fn default_roster() -> Vec<AgentConfig> {
    vec![
        AgentConfig {
            role: AgentRole::PrimaryAnalysis,
            provider: ProviderKind::ClaudeCli,
            model: "claude-sonnet-4-5-20250929".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            enabled: true,
        },
        AgentConfig {
            role: AgentRole::Sentiment,
            provider: ProviderKind::ClaudeCli,
            model: "claude-3-5-haiku-latest".to_string(),
            temperature: 0.5,
            max_tokens: 800,
            enabled: true,
        },
        AgentConfig {
            role: AgentRole::HistoricalComparison,
            provider: ProviderKind::Ollama,
            model: "llama3.1".to_string(),
            temperature: 0.1,
            max_tokens: 500,
            enabled: true,
        },
        AgentConfig {
            role: AgentRole::MarketImpact,
            provider: ProviderKind::Ollama,
            model: "llama3.1".to_string(),
            temperature: 0.1,
            max_tokens: 500,
            enabled: true,
        },
    ]
}
