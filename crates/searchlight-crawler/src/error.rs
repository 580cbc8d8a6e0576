//! Crawl error types.

use thiserror::Error;

/// Errors raised while fetching or scoping pages.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The URL could not be parsed or is not HTTP(S)
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request timed out
    #[error("timed out fetching {0}")]
    Timeout(String),

    /// The connection could not be established
    #[error("connection failed for {url}: {message}")]
    Connection {
        /// Requested URL
        url: String,
        /// Underlying error
        message: String,
    },

    /// The redirect chain exceeded the configured limit
    #[error("too many redirects for {0}")]
    TooManyRedirects(String),

    /// Any other request or body error
    #[error("request failed for {url}: {message}")]
    Request {
        /// Requested URL
        url: String,
        /// Underlying error
        message: String,
    },

    /// The HTTP client could not be built
    #[error("client configuration error: {0}")]
    Client(String),
}

impl CrawlError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection { .. })
    }
}

/// Result type for crawl operations.
pub type Result<T> = std::result::Result<T, CrawlError>;
