//! Prompt construction and response parsing for LLM scoring.

use crate::category::GeoCategory;
use crate::error::{GeoError, Result};
use crate::page::GeoPageInput;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

/// System prompt sent with every GEO chunk.
pub const SYSTEM_PROMPT: &str = "You audit web pages for generative engine optimization: how \
likely an AI assistant is to understand, trust and cite the page. Score each page from 0 to 100 \
in the categories content_structure, answer_readiness, authority, structured_data and freshness. \
Reply with a JSON object only: {\"pages\": [...]} holding one entry per page of the form \
{\"url\": string, \"scores\": {category: integer}, \"recommendations\": [string]}. \
Give at most three concise recommendations per page.";

/// One page as reported by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPageScore {
    /// URL echoed by the model
    pub url: String,
    /// Recognized category scores, clamped to `[0, 100]`
    pub scores: BTreeMap<GeoCategory, i64>,
    /// Recommendations, trimmed and non-empty
    pub recommendations: Vec<String>,
}

/// Render the user prompt for a chunk of pages.
#[must_use]
pub fn build_prompt(pages: &[GeoPageInput], excerpt_chars: usize) -> String {
    let mut prompt = format!("Score the following {} page(s).\n", pages.len());
    for (i, page) in pages.iter().enumerate() {
        let _ = write!(prompt, "\n## Page {}\nURL: {}\n", i + 1, page.url);
        if let Some(title) = &page.title {
            let _ = writeln!(prompt, "Title: {title}");
        }
        if let Some(description) = &page.meta_description {
            let _ = writeln!(prompt, "Meta description: {description}");
        }
        let _ = writeln!(
            prompt,
            "Headings: {} h1, {} h2. Words: {}. Links: {} internal, {} external.",
            page.h1_count, page.h2_count, page.word_count, page.internal_links, page.external_links
        );
        if page.has_structured_data {
            let _ = writeln!(
                prompt,
                "Structured data types: {}",
                page.structured_data_types.join(", ")
            );
        } else {
            prompt.push_str("Structured data: none\n");
        }
        let excerpt: String = page.excerpt.chars().take(excerpt_chars).collect();
        let _ = writeln!(prompt, "Text:\n{excerpt}");
    }
    prompt
}

/// Parse a model reply.
///
/// Accepts a bare JSON array, an object with a `pages` array, and either of
/// those wrapped in a Markdown code fence or surrounded by prose.
pub fn parse_response(text: &str) -> Result<Vec<ParsedPageScore>> {
    let json = extract_json(text)
        .ok_or_else(|| GeoError::MalformedResponse("no JSON found in reply".to_string()))?;
    let value: Value = serde_json::from_str(json)?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("pages") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(GeoError::MalformedResponse(
                    "expected an array of pages".to_string(),
                ))
            }
        },
        _ => {
            return Err(GeoError::MalformedResponse(
                "expected an array of pages".to_string(),
            ))
        }
    };

    Ok(entries.iter().filter_map(parse_entry).collect())
}

fn parse_entry(entry: &Value) -> Option<ParsedPageScore> {
    let url = entry.get("url")?.as_str()?.trim().to_string();
    let scores = entry
        .get("scores")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| Some((GeoCategory::parse(k)?, score_value(v)?)))
                .collect()
        })
        .unwrap_or_default();
    let recommendations = entry
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(ParsedPageScore {
        url,
        scores,
        recommendations,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn score_value(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if raw.is_finite() {
        Some((raw.round() as i64).clamp(0, 100))
    } else {
        None
    }
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let open = text[start..].chars().next()?;
    let close = if open == '[' { ']' } else { '}' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Key used to match model URLs back to crawled pages.
#[must_use]
pub fn url_key(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}
