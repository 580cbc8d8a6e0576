//! Searchlight LLM - provider abstraction used to score pages for GEO audits.
//!
//! A single [`LlmProvider`] is selected from configuration with
//! [`provider_from_config`] and shared by every batch the runner executes.
//!
//! # Example
//!
//! ```rust
//! use searchlight_core::LlmConfig;
//! use searchlight_llm::provider_from_config;
//!
//! // Disabled by default: GEO audits fall back to heuristic scoring.
//! let provider = provider_from_config(&LlmConfig::default()).unwrap();
//! assert!(provider.is_none());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod provider;
pub mod providers;

use searchlight_core::LlmConfig;
use std::sync::Arc;

// Re-export commonly used types
pub use error::{LlmError, Result};
pub use provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, MessageRole, OutputFormat,
    ProviderCapabilities, Usage,
};
pub use providers::{AnthropicProvider, OpenAiProvider};

/// Build the provider named in the configuration.
///
/// Returns `Ok(None)` when LLM use is disabled.
///
/// # Errors
/// - [`LlmError::InvalidRequest`] when enabled without an API key
/// - [`LlmError::ProviderNotFound`] for an unknown provider name
pub fn provider_from_config(config: &LlmConfig) -> Result<Option<Arc<dyn LlmProvider>>> {
    if !config.enabled {
        tracing::debug!("LLM disabled in configuration");
        return Ok(None);
    }

    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            LlmError::InvalidRequest(format!(
                "llm.enabled is set but no API key was provided for {}",
                config.provider
            ))
        })?;

    let provider: Arc<dyn LlmProvider> = match config.provider.to_ascii_lowercase().as_str() {
        "anthropic" => Arc::new(match &config.model {
            Some(model) => AnthropicProvider::with_model(api_key, model)?,
            None => AnthropicProvider::new(api_key)?,
        }),
        "openai" => Arc::new(match &config.model {
            Some(model) => OpenAiProvider::with_model(api_key, model)?,
            None => OpenAiProvider::new(api_key)?,
        }),
        other => {
            return Err(LlmError::ProviderNotFound {
                provider_id: other.to_string(),
            })
        }
    };

    tracing::info!(
        provider = provider.provider_id(),
        model = %provider.capabilities().model_name,
        "LLM provider configured"
    );
    Ok(Some(provider))
}
