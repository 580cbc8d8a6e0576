//! Searchlight GEO - generative engine optimization scoring.
//!
//! Pages crawled by a GEO audit are scored in five categories, either by an
//! LLM (in chunks of several pages per prompt) or from on-page signals. Each
//! page's weighted score feeds an audit-level [`GeoSummary`].
//!
//! # Example
//!
//! ```rust
//! use searchlight_geo::{weighted_score, GeoCategory};
//! use std::collections::BTreeMap;
//!
//! let scores: BTreeMap<_, _> = [(GeoCategory::Authority, 90)].into_iter().collect();
//! assert_eq!(weighted_score(&scores), Some(90));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregate;
pub mod analyzer;
pub mod category;
pub mod error;
pub mod heuristic;
pub mod page;
pub mod prompt;

// Re-export commonly used types
pub use aggregate::{aggregate, GeoSummary, RecommendationCount};
pub use analyzer::GeoAnalyzer;
pub use category::{weighted_score, GeoCategory};
pub use error::{GeoError, Result};
pub use page::{GeoPageInput, PageGeoScore, ScoreSource};
