//! Fetching pages over HTTP.

use crate::error::{CrawlError, Result};
use async_trait::async_trait;
use searchlight_core::CrawlerConfig;
use std::time::{Duration, Instant};

/// Default number of attempts per URL.
const MAX_RETRIES: u32 = 3;

/// Base delay between attempts, multiplied by the attempt number.
const RETRY_DELAY_MS: u64 = 1000;

/// Extra backoff factor applied after an HTTP 429.
const RATE_LIMIT_BACKOFF_MULTIPLIER: u32 = 3;

/// A fetched response. Non-2xx responses are pages too; the caller scores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Response body decoded as text
    pub body: String,
    /// Time until the body was read
    pub elapsed: Duration,
}

impl FetchedPage {
    /// 2xx response.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body is HTML (or the server did not say).
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.to_ascii_lowercase().contains("html"))
    }

    /// Worth retrying: server error or rate limit.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || self.status >= 500
    }
}

/// Source of pages for the crawler.
///
/// Implementations must be thread-safe; the batch runner fetches several
/// pages concurrently through one fetcher.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a single URL once.
    ///
    /// # Errors
    /// Returns an error only for transport failures. HTTP error statuses are
    /// reported through [`FetchedPage::status`].
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// [`PageFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher from crawler settings.
    ///
    /// # Errors
    /// Returns `CrawlError::Client` if the TLS backend cannot be initialized.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| CrawlError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    fn classify(url: &str, err: &reqwest::Error) -> CrawlError {
        if err.is_timeout() {
            CrawlError::Timeout(url.to_string())
        } else if err.is_connect() {
            CrawlError::Connection {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else if err.is_redirect() {
            CrawlError::TooManyRedirects(url.to_string())
        } else if err.is_builder() {
            CrawlError::InvalidUrl(url.to_string())
        } else {
            CrawlError::Request {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::classify(url, &e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| Self::classify(url, &e))?;

        tracing::debug!(url, status, elapsed_ms = started.elapsed().as_millis(), "Fetched page");

        Ok(FetchedPage {
            final_url,
            status,
            content_type,
            body,
            elapsed: started.elapsed(),
        })
    }
}

/// How persistently to retry a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * retry_delay`
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Policy from crawler settings.
    #[must_use]
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }
}

/// Fetch a URL, retrying timeouts, connection failures, 5xx and 429.
///
/// Other 4xx responses and non-transient errors return immediately. When the
/// last attempt still yields a retryable status, that response is returned so
/// the caller can score the page.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    policy: &RetryPolicy,
) -> Result<FetchedPage> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        let is_last = attempt + 1 == attempts;
        let mut backoff_multiplier = 1;

        match fetcher.fetch(url).await {
            Ok(page) if page.is_retryable() && !is_last => {
                if page.status == 429 {
                    backoff_multiplier = RATE_LIMIT_BACKOFF_MULTIPLIER;
                    tracing::warn!(url, "Rate limited, using longer backoff");
                }
            }
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() => last_error = Some(e),
            Err(e) => return Err(e),
        }

        if !is_last {
            let delay = policy.retry_delay * backoff_multiplier * (attempt + 1);
            tracing::warn!(
                url,
                attempt = attempt + 1,
                max_attempts = attempts,
                ?delay,
                "Fetch failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(last_error.unwrap_or_else(|| CrawlError::Request {
        url: url.to_string(),
        message: "no attempt succeeded".to_string(),
    }))
}
