//! Audit-level GEO roll-up.

use crate::category::GeoCategory;
use crate::page::{PageGeoScore, ScoreSource};
use searchlight_crawler::mean_rounded;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Recommendations reported on the audit.
pub const TOP_RECOMMENDATIONS: usize = 5;

/// A recommendation and how many pages received it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationCount {
    /// Recommendation text as first seen
    pub text: String,
    /// Pages it was given for
    pub pages: usize,
}

/// GEO summary stored on a completed audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoSummary {
    /// Rounded mean of page scores
    pub score: Option<i64>,
    /// Pages with a score
    pub pages_scored: usize,
    /// Pages scored by the LLM
    pub llm_scored: usize,
    /// Rounded mean per category over the pages that have it
    pub category_scores: BTreeMap<GeoCategory, i64>,
    /// Most frequent recommendations
    pub top_recommendations: Vec<RecommendationCount>,
}

/// Aggregate page results into the audit's GEO summary.
#[must_use]
pub fn aggregate(pages: &[PageGeoScore]) -> GeoSummary {
    let scored: Vec<i64> = pages.iter().filter_map(|p| p.score).collect();

    let mut per_category: BTreeMap<GeoCategory, Vec<i64>> = BTreeMap::new();
    for page in pages {
        for (category, score) in &page.categories {
            per_category.entry(*category).or_default().push(*score);
        }
    }
    let category_scores = per_category
        .into_iter()
        .filter_map(|(category, scores)| Some((category, mean_rounded(scores)?)))
        .collect();

    GeoSummary {
        score: mean_rounded(scored.iter().copied()),
        pages_scored: scored.len(),
        llm_scored: pages.iter().filter(|p| p.source == ScoreSource::Llm).count(),
        category_scores,
        top_recommendations: top_recommendations(pages, TOP_RECOMMENDATIONS),
    }
}

fn top_recommendations(pages: &[PageGeoScore], limit: usize) -> Vec<RecommendationCount> {
    // keyed case-insensitively; first spelling wins
    let mut counts: HashMap<String, RecommendationCount> = HashMap::new();
    for page in pages {
        let mut seen_on_page = Vec::new();
        for text in &page.recommendations {
            let key = text.trim().to_lowercase();
            if key.is_empty() || seen_on_page.contains(&key) {
                continue;
            }
            counts
                .entry(key.clone())
                .or_insert_with(|| RecommendationCount {
                    text: text.trim().to_string(),
                    pages: 0,
                })
                .pages += 1;
            seen_on_page.push(key);
        }
    }

    let mut ranked: Vec<_> = counts.into_values().collect();
    ranked.sort_by(|a, b| b.pages.cmp(&a.pages).then_with(|| a.text.cmp(&b.text)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(url: &str, scores: &[(GeoCategory, i64)], recs: &[&str]) -> PageGeoScore {
        PageGeoScore::new(
            url,
            scores.iter().copied().collect(),
            recs.iter().map(ToString::to_string).collect(),
            ScoreSource::Llm,
        )
    }

    #[test]
    fn test_aggregate_means() {
        let pages = vec![
            scored(
                "https://a.test/",
                &[(GeoCategory::Authority, 80), (GeoCategory::Freshness, 40)],
                &["Add author bios", "Cite sources"],
            ),
            scored(
                "https://a.test/b",
                &[(GeoCategory::Authority, 61)],
                &["add author bios "],
            ),
        ];
        let summary = aggregate(&pages);

        // page scores: (0.2*80 + 0.15*40)/0.35 = 62.86 -> 63, and 61
        assert_eq!(summary.score, Some(62));
        assert_eq!(summary.pages_scored, 2);
        assert_eq!(summary.llm_scored, 2);
        assert_eq!(summary.category_scores[&GeoCategory::Authority], 71);
        assert_eq!(summary.category_scores[&GeoCategory::Freshness], 40);
        assert_eq!(summary.top_recommendations[0].text, "Add author bios");
        assert_eq!(summary.top_recommendations[0].pages, 2);
        assert_eq!(summary.top_recommendations[1].pages, 1);
    }

    #[test]
    fn test_recommendations_capped_and_deduped_per_page() {
        let mut recs: Vec<String> = (0..8).map(|i| format!("Fix {i}")).collect();
        recs.push("Fix 0".to_string());
        let recs: Vec<&str> = recs.iter().map(String::as_str).collect();
        let page = scored("https://a.test/", &[], &recs);
        let summary = aggregate(&[page]);

        assert_eq!(summary.top_recommendations.len(), TOP_RECOMMENDATIONS);
        assert!(summary.top_recommendations.iter().all(|r| r.pages == 1));
        assert_eq!(summary.score, None);
        assert_eq!(summary.pages_scored, 0);
    }

    #[test]
    fn test_empty() {
        assert_eq!(aggregate(&[]), GeoSummary::default());
    }
}
