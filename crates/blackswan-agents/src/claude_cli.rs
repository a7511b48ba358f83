use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use blackswan_models::{AgentRequest, AgentResponse};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::client::ModelClient;
use crate::error::ModelError;
use crate::parser::decode_agent_reply;
use crate::prompts::render_messages;

/// Stderr fragments that mean retrying cannot help.
const REJECTION_MARKERS: [&str; 6] = [
    "invalid",
    "not found",
    "not_found",
    "unauthorized",
    "permission",
    "400",
];

/// Provider that shells out to the `claude` CLI.
///
/// The child process is killed when the call future is dropped, so a timeout
/// or a cancelled analysis never leaves a stray process behind. The CLI has no
/// temperature or output-size flags; those parameters only apply to providers
/// that accept them.
pub struct ClaudeCliClient {
    binary: String,
}

impl ClaudeCliClient {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for ClaudeCliClient {
    fn default() -> Self {
        Self::new("claude")
    }
}

/// Invoke the CLI with a system prompt and user prompt.
/// Returns the raw stdout text.
pub async fn invoke_claude(
    binary: &str,
    system_prompt: &str,
    user_prompt: &str,
    model: &str,
    timeout: Duration,
) -> Result<String, ModelError> {
    debug!(%model, "Invoking claude CLI");

    let output = tokio::time::timeout(timeout, async {
        Command::new(binary)
            .args([
                "-p",
                user_prompt,
                "--system-prompt",
                system_prompt,
                "--model",
                model,
                "--output-format",
                "text",
            ])
            .kill_on_drop(true)
            .output()
            .await
    })
    .await
    .map_err(|_| ModelError::Timeout(timeout))?
    .map_err(|e| match e.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => {
            ModelError::ProviderRejected(format!("Cannot run {binary}: {e}"))
        }
        _ => ModelError::Transport(format!("Failed to spawn {binary}: {e}")),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = %output.status, stderr = %stderr, "Claude CLI failed");
        return Err(classify_exit(&output.status.to_string(), &stderr));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if stdout.trim().is_empty() {
        return Err(ModelError::MalformedResponse(
            "Claude returned empty response".to_string(),
        ));
    }

    Ok(stdout)
}

fn classify_exit(status: &str, stderr: &str) -> ModelError {
    let lowered = stderr.to_lowercase();
    let message = format!("claude exited {status}: {}", stderr.trim());
    if REJECTION_MARKERS.iter().any(|m| lowered.contains(m)) {
        ModelError::ProviderRejected(message)
    } else {
        ModelError::Transport(message)
    }
}

/// Check if the CLI is available on the system.
pub async fn check_cli_available(binary: &str) -> bool {
    match Command::new(binary).arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[async_trait]
impl ModelClient for ClaudeCliClient {
    fn provider(&self) -> &str {
        "claude_cli"
    }

    async fn call(
        &self,
        request: &AgentRequest,
        timeout: Duration,
    ) -> Result<AgentResponse, ModelError> {
        let messages = render_messages(request);
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let user: Vec<&str> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| m.content.as_str())
            .collect();

        let raw = invoke_claude(
            &self.binary,
            &system.join("\n\n"),
            &user.join("\n\n"),
            &request.params.model,
            timeout,
        )
        .await?;
        decode_agent_reply(request.role, &request.params.model, &raw)
    }
}
