//! Rolling page results up into an audit score and summary.

use crate::issue::{Issue, IssueKind, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean of the values rounded half away from zero, or `None` when empty.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn mean_rounded<I>(values: I) -> Option<i64>
where
    I: IntoIterator<Item = i64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0i64, 0i64), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some((sum as f64 / count as f64).round() as i64)
    }
}

/// Combined score of one page: mean of its SEO and performance scores.
#[must_use]
pub fn page_score(seo: i64, performance: i64) -> i64 {
    mean_rounded([seo, performance]).unwrap_or(0)
}

/// Roll-up stored on a completed audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Pages fetched and scored
    pub pages_crawled: usize,
    /// Pages that could not be fetched
    pub pages_failed: usize,
    /// Mean page score (SEO and performance combined)
    pub overall_score: Option<i64>,
    /// Mean SEO score
    pub seo_score: Option<i64>,
    /// Mean performance score
    pub performance_score: Option<i64>,
    /// Occurrences of each issue kind
    pub issue_counts: BTreeMap<IssueKind, usize>,
    /// Occurrences per severity
    pub severity_counts: BTreeMap<Severity, usize>,
}

/// Accumulates page results into an [`AuditSummary`].
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    seo: Vec<i64>,
    performance: Vec<i64>,
    pages: Vec<i64>,
    failed: usize,
    issue_counts: BTreeMap<IssueKind, usize>,
    severity_counts: BTreeMap<Severity, usize>,
}

impl SummaryBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a crawled page.
    pub fn add_page(&mut self, seo: i64, performance: i64, issues: &[Issue]) {
        self.seo.push(seo);
        self.performance.push(performance);
        self.pages.push(page_score(seo, performance));
        for issue in issues {
            *self.issue_counts.entry(issue.kind).or_default() += 1;
            *self.severity_counts.entry(issue.severity).or_default() += 1;
        }
    }

    /// Count a page that failed to fetch.
    pub fn add_failed(&mut self) {
        self.failed += 1;
    }

    /// Finish the summary.
    #[must_use]
    pub fn build(self) -> AuditSummary {
        AuditSummary {
            pages_crawled: self.pages.len(),
            pages_failed: self.failed,
            overall_score: mean_rounded(self.pages),
            seo_score: mean_rounded(self.seo),
            performance_score: mean_rounded(self.performance),
            issue_counts: self.issue_counts,
            severity_counts: self.severity_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_rounded() {
        assert_eq!(mean_rounded(Vec::<i64>::new()), None);
        assert_eq!(mean_rounded([80, 81]), Some(81));
        assert_eq!(mean_rounded([70, 71, 71]), Some(71));
        assert_eq!(mean_rounded([0]), Some(0));
    }

    #[test]
    fn test_page_score() {
        assert_eq!(page_score(90, 60), 75);
        assert_eq!(page_score(91, 60), 76);
    }

    #[test]
    fn test_summary_counts_issues() {
        let mut builder = SummaryBuilder::new();
        builder.add_page(
            90,
            100,
            &[Issue::new(IssueKind::MissingCanonical, "no canonical")],
        );
        builder.add_page(
            70,
            80,
            &[
                Issue::new(IssueKind::MissingCanonical, "no canonical"),
                Issue::new(IssueKind::MissingTitle, "no title"),
            ],
        );
        builder.add_failed();

        let summary = builder.build();
        assert_eq!(summary.pages_crawled, 2);
        assert_eq!(summary.pages_failed, 1);
        assert_eq!(summary.seo_score, Some(80));
        assert_eq!(summary.performance_score, Some(90));
        assert_eq!(summary.overall_score, Some(85));
        assert_eq!(summary.issue_counts[&IssueKind::MissingCanonical], 2);
        assert_eq!(summary.severity_counts[&Severity::Critical], 1);

        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["issue_counts"]["missing_canonical"], 2);
    }

    #[test]
    fn test_empty_summary() {
        let summary = SummaryBuilder::new().build();
        assert_eq!(summary.overall_score, None);
        assert_eq!(summary.pages_crawled, 0);
    }
}
