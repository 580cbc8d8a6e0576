//! Signal-based GEO scoring used when no LLM is configured or a call fails.
//!
//! Freshness cannot be judged from markup alone, so it is left unscored and
//! the weighted score renormalizes over the remaining categories.

use crate::category::GeoCategory;
use crate::page::{GeoPageInput, PageGeoScore, ScoreSource};
use std::collections::BTreeMap;

const ARTICLE_TYPES: [&str; 4] = ["Article", "BlogPosting", "NewsArticle", "FAQPage"];

/// Score a page from its on-page signals.
#[must_use]
pub fn score_page(page: &GeoPageInput) -> PageGeoScore {
    let mut categories = BTreeMap::new();
    let mut recommendations = Vec::new();

    let mut structure = match page.h1_count {
        1 => 40,
        0 => {
            recommendations.push("Add a single H1 that states the page topic".to_string());
            0
        }
        _ => 25,
    };
    structure += cap(page.h2_count, 4) * 10;
    if page.h2_count == 0 {
        recommendations.push("Break content into H2 sections that mirror user questions".to_string());
    }
    if page.word_count >= 300 {
        structure += 20;
    }
    categories.insert(GeoCategory::ContentStructure, structure);

    let mut answers = 0;
    if page.title.is_some() {
        answers += 30;
    }
    if page.meta_description.is_some() {
        answers += 30;
    } else {
        recommendations.push("Write a meta description that answers the core query".to_string());
    }
    answers += match page.word_count {
        n if n >= 600 => 40,
        n if n >= 300 => 25,
        _ => {
            recommendations.push("Expand thin content with direct, quotable answers".to_string());
            10
        }
    };
    categories.insert(GeoCategory::AnswerReadiness, answers);

    let mut authority = cap(page.external_links, 5) * 8 + cap(page.internal_links, 10) * 4;
    if page.lang.is_some() {
        authority += 20;
    }
    if page.external_links == 0 {
        recommendations.push("Cite reputable external sources".to_string());
    }
    categories.insert(GeoCategory::Authority, authority);

    let structured = if page.has_structured_data {
        let article_bonus = if page
            .structured_data_types
            .iter()
            .any(|t| ARTICLE_TYPES.contains(&t.as_str()))
        {
            10
        } else {
            0
        };
        60 + cap(page.structured_data_types.len(), 3) * 10 + article_bonus
    } else {
        recommendations.push("Add schema.org JSON-LD markup".to_string());
        0
    };
    categories.insert(GeoCategory::StructuredData, structured);

    PageGeoScore::new(&page.url, categories, recommendations, ScoreSource::Heuristic)
}

#[allow(clippy::cast_possible_wrap)]
fn cap(n: usize, max: usize) -> i64 {
    n.min(max) as i64
}
