//! Error types for the batch runner.

use searchlight_crawler::CrawlError;
use searchlight_db::DatabaseError;
use thiserror::Error;

/// Errors raised while running or sweeping audits.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Database read or write failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The audit's target URL cannot be crawled
    #[error("invalid target URL: {0}")]
    InvalidTarget(#[from] CrawlError),

    /// The audit row disappeared
    #[error("audit not found: {0}")]
    AuditNotFound(String),

    /// Continuation could not be scheduled
    #[error("continuation failed: {0}")]
    Continuation(String),

    /// JSON encoding error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
