//! Searchlight Metrics - platform payload normalization.
//!
//! Reporting payloads from `LinkedIn`, Google Analytics 4 and `HubSpot` are
//! normalized into one daily time series of `(platform, metric, date, value)`
//! points, which the database layer stores in `campaign_metrics`.
//!
//! # Example
//!
//! ```rust
//! use searchlight_metrics::{normalize, Platform};
//! use serde_json::json;
//!
//! let payload = json!({"2026-03-01": [{"breakdown": "organic", "visits": 12}]});
//! let normalized = normalize(Platform::Hubspot, &payload).unwrap();
//! assert_eq!(normalized.points.len(), 1);
//! assert_eq!(normalized.points[0].metric, "visits");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod normalize;
pub mod platform;
pub mod point;
pub mod refresh;
pub mod summary;

// Re-export commonly used types
pub use error::{MetricsError, Result};
pub use normalize::normalize;
pub use platform::Platform;
pub use point::{MetricPoint, Normalized};
pub use refresh::{connection_health, needs_refresh, ConnectionHealth, DEFAULT_REFRESH_SKEW};
pub use summary::{summarize, summarize_totals, MetricSummary};
