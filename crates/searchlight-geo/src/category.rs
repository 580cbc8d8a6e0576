//! GEO scoring categories and their weights.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One dimension of AI-readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoCategory {
    /// Headings, sectioning and scannable layout
    ContentStructure,
    /// Direct, quotable answers to likely questions
    AnswerReadiness,
    /// Citations, authorship and outbound references
    Authority,
    /// Schema.org markup
    StructuredData,
    /// Visible dates and up-to-date content
    Freshness,
}

impl GeoCategory {
    /// Every category, in prompt order.
    pub const ALL: [Self; 5] = [
        Self::ContentStructure,
        Self::AnswerReadiness,
        Self::Authority,
        Self::StructuredData,
        Self::Freshness,
    ];

    /// Relative weight in the page score. Weights sum to 1.0.
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::ContentStructure | Self::AnswerReadiness => 0.25,
            Self::Authority => 0.20,
            Self::StructuredData | Self::Freshness => 0.15,
        }
    }

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentStructure => "content_structure",
            Self::AnswerReadiness => "answer_readiness",
            Self::Authority => "authority",
            Self::StructuredData => "structured_data",
            Self::Freshness => "freshness",
        }
    }

    /// Parse a wire name. Hyphens and case are tolerated since models drift.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

impl fmt::Display for GeoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted page score over the categories present.
///
/// Weights are renormalized over the categories that have a score, so a page
/// missing one category is not dragged toward zero. Returns `None` when no
/// category is scored.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn weighted_score(sub_scores: &BTreeMap<GeoCategory, i64>) -> Option<i64> {
    let (total, weight) = sub_scores
        .iter()
        .fold((0.0, 0.0), |(total, weight), (category, score)| {
            let w = category.weight();
            (total + w * (*score).clamp(0, 100) as f64, weight + w)
        });

    if weight > 0.0 {
        Some((total / weight).round() as i64)
    } else {
        None
    }
}
