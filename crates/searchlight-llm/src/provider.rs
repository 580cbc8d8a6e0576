//! The provider seam and the completion types passed across it.
//!
//! GEO scoring sends one request per chunk of pages and expects a JSON
//! document back, so requests carry an [`OutputFormat`] and responses know
//! how to pull the JSON out of whatever the model wrapped around it.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A hosted model that answers completion requests.
///
/// One provider is shared by every batch the runner executes, so
/// implementations must be `Send + Sync`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one request and wait for the full reply.
    ///
    /// # Errors
    /// Returns error on transport failures, error statuses or undecodable bodies.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// What the configured model can do.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Stable provider name used in logs and configuration.
    fn provider_id(&self) -> &str;
}

/// Model limits and features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Context window in tokens
    pub max_context_tokens: usize,
    /// Whether [`OutputFormat::Json`] is enforced server-side
    pub supports_json_mode: bool,
    /// Model identifier
    pub model_name: String,
}

/// Shape the reply should take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Free text
    #[default]
    Text,
    /// A single JSON object
    Json,
}

/// One completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Conversation, oldest first
    pub messages: Vec<Message>,
    /// Instructions sent ahead of the conversation
    pub system_prompt: Option<String>,
    /// Reply length cap
    pub max_tokens: Option<u32>,
    /// Sampling temperature; scoring runs low
    pub temperature: Option<f32>,
    /// Requested reply shape
    #[serde(default)]
    pub output: OutputFormat,
}

impl CompletionRequest {
    /// A request holding a single user message.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            system_prompt: None,
            max_tokens: None,
            temperature: None,
            output: OutputFormat::Text,
        }
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Cap the reply length.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Ask for a JSON object reply.
    #[must_use]
    pub fn with_json_output(mut self) -> Self {
        self.output = OutputFormat::Json;
        self
    }

    /// Concatenated message text, used to size chunks against the context window.
    #[must_use]
    pub fn prompt_chars(&self) -> usize {
        self.system_prompt.as_ref().map_or(0, String::len)
            + self.messages.iter().map(|m| m.content.len()).sum::<usize>()
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who said it
    pub role: MessageRole,
    /// What was said
    pub content: String,
}

impl Message {
    /// A user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// An instruction turn. Providers without in-conversation system turns fold
    /// these into the system prompt.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Speaker of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions
    System,
    /// The caller
    User,
    /// The model
    Assistant,
}

/// A finished completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Reply text
    pub content: String,
    /// Model that answered
    pub model: String,
    /// Provider-specific stop reason
    pub stop_reason: Option<String>,
    /// Token accounting, when reported
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Whether the reply hit the length cap and is probably cut off.
    #[must_use]
    pub fn truncated(&self) -> bool {
        matches!(self.stop_reason.as_deref(), Some("max_tokens" | "length"))
    }

    /// The JSON document inside the reply.
    ///
    /// Models often wrap JSON in a fenced block or a sentence of prose; this
    /// returns the span from the first `{` or `[` to the matching last
    /// closing bracket.
    #[must_use]
    pub fn json_body(&self) -> Option<&str> {
        let text = self.content.trim();
        let start = text.find(['{', '['])?;
        let close = if text[start..].starts_with('{') { '}' } else { ']' };
        let end = text.rfind(close)?;
        (end > start).then(|| &text[start..=end])
    }
}

/// Tokens billed for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Reply tokens
    pub output_tokens: u32,
}

impl Usage {
    /// Prompt plus reply tokens.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}
