pub mod agent_message;
pub mod analysis;
pub mod cache_schema;
pub mod config;
pub mod event;
pub mod fingerprint;
pub mod market;
pub mod severity;

pub use agent_message::{AgentRequest, AgentResponse, AgentRole, ChatMessage, ModelParams};
pub use analysis::{
    AgentContribution, AnalysisRequest, AnalysisResult, ConsensusLevel, ConsensusReasoning,
    OUTPUT_SCHEMA_VERSION,
};
pub use cache_schema::CacheRow;
pub use config::{
    AgentConfig, CacheBackend, CacheConfig, OrchestratorConfig, ProviderKind, ProvidersConfig,
    RetryConfig, SwanConfig,
};
pub use event::{Event, SimilarEvent};
pub use fingerprint::Fingerprint;
pub use market::MarketContext;
pub use severity::Severity;
