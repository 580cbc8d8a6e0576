//! Helpers shared by the HTTP providers.

use crate::error::{LlmError, Result};
use crate::provider::MessageRole;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout for a single completion call.
const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Build the HTTP client used by a provider.
///
/// # Errors
/// Returns error if the HTTP client cannot be created.
pub fn build_http_client(timeout_secs: Option<u64>) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)))
        .build()
        .map_err(|e| LlmError::Internal(format!("failed to create HTTP client: {e}")))
}

/// Standard role string ("system", "user", "assistant").
#[must_use]
pub fn convert_role_standard(role: MessageRole) -> String {
    match role {
        MessageRole::System => "system".to_string(),
        MessageRole::User => "user".to_string(),
        MessageRole::Assistant => "assistant".to_string(),
    }
}

/// Map a non-success HTTP status to an error.
#[must_use]
pub fn error_for_status(provider: &str, status: u16, body: String) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthenticationFailed {
            provider: provider.to_string(),
            message: body,
        },
        429 => LlmError::RateLimitExceeded {
            provider: provider.to_string(),
            message: body,
        },
        _ => LlmError::ApiError {
            provider: provider.to_string(),
            status,
            message: body,
        },
    }
}

/// Read a response, turning error statuses into [`LlmError`] and decoding
/// success bodies as `T`.
pub async fn decode_response<T>(provider: &str, response: reqwest::Response) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::warn!(provider, status = status.as_u16(), "LLM API call failed");
        return Err(error_for_status(provider, status.as_u16(), error_text));
    }

    response.json().await.map_err(|e| LlmError::ParseError {
        provider: provider.to_string(),
        message: format!("Failed to parse response: {e}"),
    })
}

/// Message structure for `OpenAI`-compatible APIs.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StandardMessage {
    /// The role of the message sender
    pub role: String,
    /// The text content of the message
    pub content: String,
}

/// Usage block of `OpenAI`-compatible APIs.
#[derive(Debug, Deserialize, Clone)]
pub struct StandardUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
}
