//! `OpenAI` chat completions provider.

use super::common::{
    build_http_client, convert_role_standard, decode_response, StandardMessage, StandardUsage,
};
use crate::error::{LlmError, Result};
use crate::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, OutputFormat, ProviderCapabilities, Usage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Model used when the configuration does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

const PROVIDER: &str = "openai";

/// `OpenAI` API provider.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: Client,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a provider using [`DEFAULT_MODEL`].
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_model(api_key, DEFAULT_MODEL)
    }

    /// Create a provider for a specific model.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            client: build_http_client(None)?,
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    /// Point the provider at another `OpenAI`-compatible endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn to_api_request(&self, request: &CompletionRequest) -> OpenAiRequest {
        let mut messages: Vec<StandardMessage> = Vec::new();

        if let Some(system) = &request.system_prompt {
            messages.push(StandardMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        for message in &request.messages {
            messages.push(StandardMessage {
                role: convert_role_standard(message.role),
                content: message.content.clone(),
            });
        }

        OpenAiRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: match request.output {
                OutputFormat::Json => Some(ResponseFormat {
                    kind: "json_object",
                }),
                OutputFormat::Text => None,
            },
        }
    }

    fn convert_api_response(response: OpenAiResponse) -> Result<CompletionResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError {
                provider: PROVIDER.to_string(),
                message: "no choices in response".to_string(),
            })?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: response.model,
            stop_reason: choice.finish_reason,
            usage: response.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let api_request = self.to_api_request(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&api_request)
            .send()
            .await?;

        let api_response: OpenAiResponse = decode_response(PROVIDER, response).await?;
        Self::convert_api_response(api_response)
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            max_context_tokens: 128_000,
            supports_json_mode: true,
            model_name: self.model.clone(),
        }
    }

    fn provider_id(&self) -> &'static str {
        PROVIDER
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<StandardMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<StandardUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_request_conversion() {
        let provider = OpenAiProvider::new("test-key").expect("create provider");
        let request = CompletionRequest::new("Score this page")
            .with_system_prompt("You are a GEO auditor")
            .with_temperature(0.2);

        let api_request = provider.to_api_request(&request);
        assert_eq!(api_request.model, DEFAULT_MODEL);
        assert_eq!(api_request.messages.len(), 2);
        assert_eq!(api_request.messages[0].role, "system");
        assert_eq!(api_request.messages[1].role, "user");
        assert_eq!(api_request.max_tokens, None);
        assert!(api_request.response_format.is_none());
    }

    #[test]
    fn test_json_output_sets_response_format() {
        let provider = OpenAiProvider::new("test-key").expect("create provider");
        let request = CompletionRequest::new("Score this page").with_json_output();

        let body = serde_json::to_value(provider.to_api_request(&request)).expect("serialize");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_response_conversion() {
        let raw = serde_json::json!({
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "[]"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 7, "completion_tokens": 3, "total_tokens": 10}
        });
        let parsed: OpenAiResponse = serde_json::from_value(raw).expect("parse");
        let response = OpenAiProvider::convert_api_response(parsed).expect("convert");
        assert_eq!(response.content, "[]");
        assert_eq!(response.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_empty_choices_is_parse_error() {
        let parsed: OpenAiResponse =
            serde_json::from_value(serde_json::json!({"model": "gpt-4o", "choices": []}))
                .expect("parse");
        assert!(matches!(
            OpenAiProvider::convert_api_response(parsed),
            Err(LlmError::ParseError { .. })
        ));
    }
}
