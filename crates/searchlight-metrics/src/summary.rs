//! Totals and derived ratios over normalized metrics.

use crate::platform::Platform;
use crate::point::MetricPoint;
use searchlight_db::metrics::MetricTotal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Totals of one platform's metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    /// Sum per metric
    pub totals: BTreeMap<String, f64>,
    /// `clicks / impressions`, when both are present and impressions are non-zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctr: Option<f64>,
}

impl MetricSummary {
    fn add(&mut self, metric: &str, value: f64) {
        *self.totals.entry(metric.to_string()).or_insert(0.0) += value;
    }

    fn finish(mut self) -> Self {
        self.ctr = match (self.totals.get("clicks"), self.totals.get("impressions")) {
            (Some(clicks), Some(impressions)) if *impressions > 0.0 => Some(clicks / impressions),
            _ => None,
        };
        self
    }
}

/// Summarize points per platform.
#[must_use]
pub fn summarize(points: &[MetricPoint]) -> BTreeMap<Platform, MetricSummary> {
    let mut out: BTreeMap<Platform, MetricSummary> = BTreeMap::new();
    for point in points {
        out.entry(point.platform)
            .or_default()
            .add(&point.metric, point.value);
    }
    out.into_iter().map(|(p, s)| (p, s.finish())).collect()
}

/// Summarize stored totals per platform name.
#[must_use]
pub fn summarize_totals(totals: &[MetricTotal]) -> BTreeMap<String, MetricSummary> {
    let mut out: BTreeMap<String, MetricSummary> = BTreeMap::new();
    for total in totals {
        out.entry(total.platform.clone())
            .or_default()
            .add(&total.metric, total.total);
    }
    out.into_iter().map(|(p, s)| (p, s.finish())).collect()
}
