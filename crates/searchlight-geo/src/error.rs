//! Error types for GEO scoring.

use searchlight_llm::LlmError;
use thiserror::Error;

/// Errors raised while scoring pages for GEO readiness.
#[derive(Error, Debug)]
pub enum GeoError {
    /// The LLM call itself failed
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    /// The model answered with something that is not the expected JSON
    #[error("malformed GEO response: {0}")]
    MalformedResponse(String),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for GEO operations.
pub type Result<T> = std::result::Result<T, GeoError>;
