//! Black swan event analysis.
//!
//! Dispatches a market/social event to a roster of heterogeneous model
//! agents, tolerates partial failure, and synthesizes one consensus verdict
//! with a confidence spread and a human-review flag. Results are cached by a
//! canonical event/market fingerprint.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use blackswan::models::{AnalysisRequest, SwanConfig};
//!
//! # async fn run(request: AnalysisRequest) -> anyhow::Result<()> {
//! let orchestrator = blackswan::build_orchestrator(&SwanConfig::default())?;
//! let result = blackswan::analyze(&orchestrator, &request).await?;
//! println!("{} ({:.2})", result.severity, result.confidence_score);
//! # Ok(())
//! # }
//! ```

pub use blackswan_agents as agents;
pub use blackswan_cache as cache;
pub use blackswan_models as models;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use blackswan_agents::{
    Agent, AnalysisError, ClaudeCliClient, ModelClient, OllamaClient, Orchestrator,
    OrchestratorSettings, RetryPolicy, RetryingCaller, MIN_QUORUM,
};
use blackswan_cache::{MemoryResultCache, ResultStore, SqliteResultStore};
use blackswan_models::{
    AnalysisRequest, AnalysisResult, CacheBackend, CacheConfig, ProviderKind, SwanConfig,
};

/// Read and parse a TOML config file.
pub fn load_config(path: &str) -> Result<SwanConfig, anyhow::Error> {
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&config_str).with_context(|| format!("Failed to parse config: {path}"))
}

/// Reject configurations the orchestrator cannot run with.
pub fn validate_config(config: &SwanConfig) -> Result<(), anyhow::Error> {
    if config.orchestrator.min_quorum < MIN_QUORUM {
        bail!(
            "orchestrator.min_quorum must be at least {MIN_QUORUM}, got {}",
            config.orchestrator.min_quorum
        );
    }
    if config.retry.max_attempts < 1 {
        bail!("retry.max_attempts must be at least 1");
    }
    if config.retry.backoff_floor_ms > config.retry.backoff_ceiling_ms {
        bail!(
            "retry.backoff_floor_ms ({}) exceeds retry.backoff_ceiling_ms ({})",
            config.retry.backoff_floor_ms,
            config.retry.backoff_ceiling_ms
        );
    }
    if config.cache.max_entries < 1 {
        bail!("cache.max_entries must be at least 1");
    }

    let agents = config.enabled_agents();
    let mut roles = HashSet::new();
    for agent in &agents {
        if !(0.0..=1.0).contains(&agent.temperature) {
            bail!(
                "agent {}: temperature {} is outside [0, 1]",
                agent.role,
                agent.temperature
            );
        }
        if !roles.insert(agent.role) {
            bail!("agent {} is configured more than once", agent.role);
        }
    }
    if agents.len() < config.orchestrator.min_quorum {
        bail!(
            "{} enabled agents can never reach a quorum of {}",
            agents.len(),
            config.orchestrator.min_quorum
        );
    }
    Ok(())
}

/// Open the configured result store.
pub fn build_store(config: &CacheConfig) -> Result<Arc<dyn ResultStore>, anyhow::Error> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryResultCache::new(config.max_entries))),
        CacheBackend::Sqlite => {
            if let Some(parent) = Path::new(&config.sqlite_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create cache directory: {}", parent.display())
                    })?;
                }
            }
            let store = SqliteResultStore::open(&config.sqlite_path, config.max_entries)
                .with_context(|| format!("Failed to open cache: {}", config.sqlite_path))?;
            Ok(Arc::new(store))
        }
    }
}

/// Build an Orchestrator from configuration.
pub fn build_orchestrator(config: &SwanConfig) -> Result<Orchestrator, anyhow::Error> {
    validate_config(config)?;
    let cache = build_store(&config.cache)?;
    Ok(build_orchestrator_with_store(config, cache))
}

/// Build an Orchestrator around an existing store. The config is assumed
/// valid.
pub fn build_orchestrator_with_store(
    config: &SwanConfig,
    cache: Arc<dyn ResultStore>,
) -> Orchestrator {
    let claude: Arc<dyn ModelClient> =
        Arc::new(ClaudeCliClient::new(config.providers.claude_binary.clone()));
    let ollama: Arc<dyn ModelClient> =
        Arc::new(OllamaClient::new(config.providers.ollama_url.clone()));
    let policy = RetryPolicy::from_config(&config.retry);
    let timeout = Duration::from_secs(config.orchestrator.agent_timeout_seconds);

    let agents = config
        .enabled_agents()
        .into_iter()
        .map(|a| {
            let client = match a.provider {
                ProviderKind::ClaudeCli => Arc::clone(&claude),
                ProviderKind::Ollama => Arc::clone(&ollama),
            };
            Arc::new(Agent::new(
                a.role,
                a.params(),
                RetryingCaller::new(client, policy.clone()),
                timeout,
            ))
        })
        .collect();

    Orchestrator::new(agents, cache, OrchestratorSettings::from_config(config))
}

/// Analyze one event using the given orchestrator.
pub async fn analyze(
    orchestrator: &Orchestrator,
    request: &AnalysisRequest,
) -> Result<AnalysisResult, AnalysisError> {
    orchestrator.analyze(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackswan_models::{AgentConfig, AgentRole};

    const SHIPPED_CONFIG: &str = include_str!("../../../config/blackswan.toml");

    #[test]
    fn shipped_config_is_valid() {
        let config: SwanConfig = toml::from_str(SHIPPED_CONFIG).unwrap();
        validate_config(&config).unwrap();
        assert_eq!(config.enabled_agents().len(), 4);
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.orchestrator.min_quorum, 2);
    }

    #[test]
    fn default_config_is_valid() {
        validate_config(&SwanConfig::default()).unwrap();
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let mut config = SwanConfig::default();
        config.agents = vec![
            AgentConfig {
                role: AgentRole::PrimaryAnalysis,
                provider: ProviderKind::Ollama,
                model: "llama3.1".to_string(),
                temperature: 1.5,
                max_tokens: 500,
                enabled: true,
            },
            AgentConfig {
                role: AgentRole::Sentiment,
                provider: ProviderKind::Ollama,
                model: "llama3.1".to_string(),
                temperature: 0.5,
                max_tokens: 500,
                enabled: true,
            },
        ];
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn rejects_unreachable_quorum() {
        let mut config = SwanConfig::default();
        config.orchestrator.min_quorum = 5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_quorum_below_two() {
        for quorum in [0, 1] {
            let mut config = SwanConfig::default();
            config.orchestrator.min_quorum = quorum;
            let err = validate_config(&config).unwrap_err();
            assert!(err.to_string().contains("at least 2"));
        }
    }

    #[test]
    fn rejects_inverted_backoff() {
        let mut config = SwanConfig::default();
        config.retry.backoff_floor_ms = 20_000;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_duplicate_roles() {
        let mut config = SwanConfig::default();
        let mut roster = config.enabled_agents();
        roster.push(roster[0].clone());
        config.agents = roster;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn builds_roster_from_config() {
        let orchestrator = build_orchestrator(&SwanConfig::default()).unwrap();
        assert_eq!(orchestrator.roster(), AgentRole::ALL.to_vec());
        assert_eq!(orchestrator.settings().top_actions, 5);
    }

    #[test]
    fn disabled_agents_are_skipped() {
        let mut config = SwanConfig::default();
        let mut roster = config.enabled_agents();
        roster[3].enabled = false;
        config.agents = roster;
        let orchestrator = build_orchestrator(&config).unwrap();
        assert_eq!(orchestrator.roster().len(), 3);
    }

    #[tokio::test]
    async fn sqlite_backend_creates_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/cache.db");
        let config = CacheConfig {
            backend: CacheBackend::Sqlite,
            sqlite_path: path.to_string_lossy().to_string(),
            ..CacheConfig::default()
        };

        let store = build_store(&config).unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(path.exists());
    }
}
