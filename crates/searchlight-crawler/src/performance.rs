//! Performance score from response time and page weight.
//!
//! Up to 60 points for response time and 40 for document size, each on a
//! step scale.

use crate::issue::{Issue, IssueKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// (upper bound in ms, points)
const TIME_STEPS: &[(u128, u8)] = &[(200, 60), (500, 50), (1000, 40), (2000, 25), (4000, 10)];

/// (upper bound in bytes, points)
const WEIGHT_STEPS: &[(usize, u8)] = &[
    (100 * 1024, 40),
    (500 * 1024, 30),
    (1024 * 1024, 20),
    (3 * 1024 * 1024, 10),
];

const SLOW_RESPONSE_MS: u128 = 1000;
const LARGE_PAGE_BYTES: usize = 1024 * 1024;

/// Performance result for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Score in `[0, 100]`
    pub score: u8,
    /// Slow-response and page-weight findings
    pub issues: Vec<Issue>,
}

fn step_points<T: PartialOrd + Copy>(value: T, steps: &[(T, u8)]) -> u8 {
    steps
        .iter()
        .find(|(bound, _)| value <= *bound)
        .map_or(0, |(_, points)| *points)
}

/// Score a response.
#[must_use]
pub fn evaluate(elapsed: Duration, bytes: usize) -> PerformanceReport {
    let ms = elapsed.as_millis();
    let score = step_points(ms, TIME_STEPS) + step_points(bytes, WEIGHT_STEPS);

    let mut issues = Vec::new();
    if ms > SLOW_RESPONSE_MS {
        issues.push(Issue::new(
            IssueKind::SlowResponse,
            format!("Server responded in {ms} ms"),
        ));
    }
    if bytes > LARGE_PAGE_BYTES {
        issues.push(Issue::new(
            IssueKind::LargePage,
            format!("HTML document is {} KiB", bytes / 1024),
        ));
    }

    PerformanceReport { score, issues }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_light_page() {
        let report = evaluate(Duration::from_millis(120), 30 * 1024);
        assert_eq!(report.score, 100);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_step_boundaries() {
        assert_eq!(evaluate(Duration::from_millis(200), 100 * 1024).score, 100);
        assert_eq!(evaluate(Duration::from_millis(201), 100 * 1024 + 1).score, 80);
        assert_eq!(evaluate(Duration::from_millis(1500), 2 * 1024 * 1024).score, 35);
    }

    #[test]
    fn test_slow_heavy_page() {
        let report = evaluate(Duration::from_secs(6), 5 * 1024 * 1024);
        assert_eq!(report.score, 0);
        let kinds: Vec<IssueKind> = report.issues.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueKind::SlowResponse, IssueKind::LargePage]);
    }
}
