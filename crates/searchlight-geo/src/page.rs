//! Per-page inputs and results.

use crate::category::{weighted_score, GeoCategory};
use searchlight_crawler::PageAnalysis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the scorer knows about one crawled page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoPageInput {
    /// Page URL, used to match model output back to the page
    pub url: String,
    /// `<title>` text
    pub title: Option<String>,
    /// Meta description
    pub meta_description: Option<String>,
    /// Document language
    pub lang: Option<String>,
    /// Number of `<h1>` elements
    pub h1_count: usize,
    /// Number of `<h2>` elements
    pub h2_count: usize,
    /// Words of visible text
    pub word_count: usize,
    /// JSON-LD `@type` values
    pub structured_data_types: Vec<String>,
    /// Whether any JSON-LD block was found
    pub has_structured_data: bool,
    /// Same-site link count
    pub internal_links: usize,
    /// Off-site link count
    pub external_links: usize,
    /// Visible text excerpt
    pub excerpt: String,
}

impl GeoPageInput {
    /// Build from a crawler analysis.
    #[must_use]
    pub fn from_analysis(url: impl Into<String>, analysis: &PageAnalysis) -> Self {
        Self {
            url: url.into(),
            title: analysis.title.clone(),
            meta_description: analysis.meta_description.clone(),
            lang: analysis.lang.clone(),
            h1_count: analysis.h1_count,
            h2_count: analysis.h2_count,
            word_count: analysis.word_count,
            structured_data_types: analysis.structured_data_types.clone(),
            has_structured_data: analysis.has_structured_data,
            internal_links: analysis.internal_links.len(),
            external_links: analysis.external_links.len(),
            excerpt: analysis.text_excerpt.clone(),
        }
    }
}

/// Where a page's scores came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Scored by the configured LLM
    Llm,
    /// Scored from on-page signals only
    Heuristic,
}

/// GEO result for one page. Stored as the page's `geo_details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGeoScore {
    /// Page URL
    pub url: String,
    /// Weighted page score
    pub score: Option<i64>,
    /// Sub-score per category, each in `[0, 100]`
    pub categories: BTreeMap<GeoCategory, i64>,
    /// Suggested improvements
    pub recommendations: Vec<String>,
    /// Scorer that produced the result
    pub source: ScoreSource,
}

impl PageGeoScore {
    /// Build a result, clamping sub-scores and computing the weighted score.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        categories: BTreeMap<GeoCategory, i64>,
        recommendations: Vec<String>,
        source: ScoreSource,
    ) -> Self {
        let categories: BTreeMap<_, _> = categories
            .into_iter()
            .map(|(c, s)| (c, s.clamp(0, 100)))
            .collect();
        Self {
            url: url.into(),
            score: weighted_score(&categories),
            categories,
            recommendations,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_sub_scores() {
        let categories = [
            (GeoCategory::Authority, 140),
            (GeoCategory::Freshness, -5),
        ]
        .into_iter()
        .collect();
        let page = PageGeoScore::new("https://a.test/", categories, vec![], ScoreSource::Llm);
        assert_eq!(page.categories[&GeoCategory::Authority], 100);
        assert_eq!(page.categories[&GeoCategory::Freshness], 0);
        // (0.2*100 + 0.15*0) / 0.35 = 57.1
        assert_eq!(page.score, Some(57));
    }

    #[test]
    fn test_details_json_shape() {
        let page = PageGeoScore::new(
            "https://a.test/",
            [(GeoCategory::StructuredData, 70)].into_iter().collect(),
            vec!["Add FAQ schema".to_string()],
            ScoreSource::Heuristic,
        );
        let json = serde_json::to_value(&page).expect("serialize");
        assert_eq!(json["categories"]["structured_data"], 70);
        assert_eq!(json["source"], "heuristic");
        let back: PageGeoScore = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, page);
    }
}
