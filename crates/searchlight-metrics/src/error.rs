//! Error types for metric normalization.

use thiserror::Error;

/// Errors raised while normalizing platform payloads.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Platform name not recognized
    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),

    /// The payload does not have the shape the platform returns
    #[error("invalid {platform} payload: {reason}")]
    InvalidPayload {
        /// Platform whose payload was rejected
        platform: &'static str,
        /// What was wrong
        reason: String,
    },

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for metric operations.
pub type Result<T> = std::result::Result<T, MetricsError>;
