use std::time::Duration;

use async_trait::async_trait;
use blackswan_models::{AgentRequest, AgentResponse, ChatMessage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::ModelClient;
use crate::error::ModelError;
use crate::parser::decode_agent_reply;
use crate::prompts::render_messages;

/// Provider backed by a local Ollama server's chat endpoint.
pub struct OllamaClient {
    base_url: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaReplyMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaReplyMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    pub fn with_http_client(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> ModelError {
    let message = format!("Ollama API error {status}: {body}");
    if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
        ModelError::ProviderRejected(message)
    } else {
        ModelError::Transport(message)
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    async fn call(
        &self,
        request: &AgentRequest,
        timeout: Duration,
    ) -> Result<AgentResponse, ModelError> {
        let url = self.chat_url();
        let body = OllamaChatRequest {
            model: &request.params.model,
            messages: render_messages(request),
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: request.params.temperature,
                num_predict: request.params.max_tokens,
            },
        };

        debug!(%url, model = %request.params.model, role = %request.role, "Sending Ollama chat request");

        let response = self
            .http_client
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(timeout)
                } else if e.is_connect() {
                    ModelError::Transport(format!("Cannot connect to Ollama at {}", self.base_url))
                } else {
                    ModelError::Transport(format!("Failed to send request: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "Ollama returned an error status");
            return Err(classify_status(status, &text));
        }

        let chat: OllamaChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(timeout)
            } else {
                ModelError::MalformedResponse(format!("Failed to parse Ollama response: {e}"))
            }
        })?;

        decode_agent_reply(request.role, &request.params.model, &chat.message.content)
    }
}
