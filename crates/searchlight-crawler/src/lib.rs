//! Searchlight Crawler - fetching and scoring pages for site audits.
//!
//! This crate knows nothing about audits or the database. It turns a URL into
//! a [`FetchedPage`], a page into a [`PageAnalysis`], and an analysis into
//! SEO and performance scores with an issue list.
//!
//! # Features
//!
//! - [`PageFetcher`] trait with a reqwest-backed [`HttpFetcher`]
//! - Retry with linear backoff for transient failures and a longer backoff on HTTP 429
//! - Same-site scoping and URL normalization for the crawl frontier
//! - HTML analysis with `scraper`
//! - Rule-based SEO issues, piecewise performance scoring and audit roll-ups
//!
//! # Example
//!
//! ```rust,ignore
//! use searchlight_crawler::{analyze, fetch_with_retry, seo, HttpFetcher, RetryPolicy, Scope};
//!
//! let fetcher = HttpFetcher::new(&config.crawler)?;
//! let page = fetch_with_retry(&fetcher, "https://example.com/", &RetryPolicy::default()).await?;
//! let scope = Scope::new("https://example.com/")?;
//! let analysis = analyze(&page.body, &scope.root(), &scope);
//! let report = seo::evaluate(&analysis);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod analyzer;
pub mod error;
pub mod fetcher;
pub mod issue;
pub mod performance;
pub mod score;
pub mod scope;
pub mod seo;

// Re-export commonly used types
pub use analyzer::{analyze, PageAnalysis};
pub use error::{CrawlError, Result};
pub use fetcher::{fetch_with_retry, FetchedPage, HttpFetcher, PageFetcher, RetryPolicy};
pub use issue::{Issue, IssueKind, Severity};
pub use score::{mean_rounded, page_score, AuditSummary, SummaryBuilder};
pub use scope::{normalize_url, Scope};
