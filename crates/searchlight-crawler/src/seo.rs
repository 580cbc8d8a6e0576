//! On-page SEO rules.
//!
//! The page score is `100 - sum(penalties)`, clamped to `[0, 100]`. An HTTP
//! error status scores 0 regardless of content.

use crate::analyzer::PageAnalysis;
use crate::issue::{Issue, IssueKind};
use serde::{Deserialize, Serialize};

const TITLE_MIN_CHARS: usize = 10;
const TITLE_MAX_CHARS: usize = 60;
const DESCRIPTION_MIN_CHARS: usize = 50;
const DESCRIPTION_MAX_CHARS: usize = 160;
const THIN_CONTENT_WORDS: usize = 300;
const ALT_PENALTY_PER_IMAGE: u32 = 2;
const ALT_PENALTY_CAP: u32 = 10;

/// SEO result for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoReport {
    /// Score in `[0, 100]`
    pub score: u8,
    /// Findings, most severe first
    pub issues: Vec<Issue>,
}

fn score_from(issues: &[Issue]) -> u8 {
    let total: u32 = issues.iter().map(|i| i.penalty).sum();
    u8::try_from(100u32.saturating_sub(total)).unwrap_or(0)
}

/// Report for a page that answered with an HTTP error.
#[must_use]
pub fn http_error(status: u16) -> SeoReport {
    SeoReport {
        score: 0,
        issues: vec![Issue::new(
            IssueKind::HttpError,
            format!("Page returned HTTP {status}"),
        )],
    }
}

/// Evaluate the SEO rules against an analyzed page.
#[must_use]
pub fn evaluate(page: &PageAnalysis) -> SeoReport {
    let mut issues = Vec::new();

    match page.title.as_deref() {
        None => issues.push(Issue::new(IssueKind::MissingTitle, "Page has no title")),
        Some(title) => {
            let len = title.chars().count();
            if len < TITLE_MIN_CHARS {
                issues.push(Issue::new(
                    IssueKind::TitleTooShort,
                    format!("Title is {len} characters; aim for at least {TITLE_MIN_CHARS}"),
                ));
            } else if len > TITLE_MAX_CHARS {
                issues.push(Issue::new(
                    IssueKind::TitleTooLong,
                    format!("Title is {len} characters; search engines truncate after {TITLE_MAX_CHARS}"),
                ));
            }
        }
    }

    match page.meta_description.as_deref() {
        None => issues.push(Issue::new(
            IssueKind::MissingMetaDescription,
            "Page has no meta description",
        )),
        Some(desc) => {
            let len = desc.chars().count();
            if len < DESCRIPTION_MIN_CHARS {
                issues.push(Issue::new(
                    IssueKind::MetaDescriptionTooShort,
                    format!("Meta description is {len} characters"),
                ));
            } else if len > DESCRIPTION_MAX_CHARS {
                issues.push(Issue::new(
                    IssueKind::MetaDescriptionTooLong,
                    format!("Meta description is {len} characters"),
                ));
            }
        }
    }

    match page.h1_count {
        0 => issues.push(Issue::new(IssueKind::MissingH1, "Page has no H1 heading")),
        1 => {}
        n => issues.push(Issue::new(
            IssueKind::MultipleH1,
            format!("Page has {n} H1 headings"),
        )),
    }

    if page.word_count < THIN_CONTENT_WORDS {
        issues.push(Issue::new(
            IssueKind::ThinContent,
            format!("Only {} words of text", page.word_count),
        ));
    }

    if page.images_missing_alt > 0 {
        let count = u32::try_from(page.images_missing_alt).unwrap_or(u32::MAX);
        issues.push(Issue::with_penalty(
            IssueKind::ImagesMissingAlt,
            count.saturating_mul(ALT_PENALTY_PER_IMAGE).min(ALT_PENALTY_CAP),
            format!("{count} image(s) missing alt text"),
        ));
    }

    if page.noindex {
        issues.push(Issue::new(
            IssueKind::Noindex,
            "Robots meta tag blocks indexing",
        ));
    }
    if page.canonical.is_none() {
        issues.push(Issue::new(IssueKind::MissingCanonical, "No canonical URL declared"));
    }
    if page.lang.is_none() {
        issues.push(Issue::new(IssueKind::MissingLang, "No lang attribute on <html>"));
    }
    if !page.has_viewport {
        issues.push(Issue::new(IssueKind::MissingViewport, "No viewport meta tag"));
    }
    if !page.has_structured_data {
        issues.push(Issue::new(IssueKind::NoStructuredData, "No JSON-LD structured data"));
    }

    issues.sort_by_key(|i| i.severity);
    SeoReport {
        score: score_from(&issues),
        issues,
    }
}
