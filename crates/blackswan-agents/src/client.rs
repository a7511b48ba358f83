use std::time::Duration;

use async_trait::async_trait;
use blackswan_models::{AgentRequest, AgentResponse};

use crate::error::ModelError;

/// One model provider. Mockable for testing.
///
/// Implementations must stop the underlying call once `timeout` elapses
/// (the in-flight future is dropped, which must release the process or
/// connection) and classify every failure as a [`ModelError`].
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn provider(&self) -> &str;

    async fn call(
        &self,
        request: &AgentRequest,
        timeout: Duration,
    ) -> Result<AgentResponse, ModelError>;
}
