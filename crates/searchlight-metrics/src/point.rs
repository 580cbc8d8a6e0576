//! The common time-series point every platform payload is normalized into.

use crate::platform::Platform;
use chrono::NaiveDate;
use searchlight_db::metrics::MetricRow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One value of one metric on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Source platform
    pub platform: Platform,
    /// Metric name in `snake_case`
    pub metric: String,
    /// Day the value belongs to
    pub date: NaiveDate,
    /// Value
    pub value: f64,
}

impl MetricPoint {
    /// Storage row for this point.
    #[must_use]
    pub fn to_row(&self) -> MetricRow {
        MetricRow {
            platform: self.platform.as_str().to_string(),
            metric: self.metric.clone(),
            date: self.date.format("%Y-%m-%d").to_string(),
            value: self.value,
        }
    }
}

/// Result of normalizing one payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Normalized {
    /// Points in `(date, metric)` order
    pub points: Vec<MetricPoint>,
    /// Values dropped for an unparseable date or value
    pub skipped: usize,
}

impl Normalized {
    /// Storage rows for every point.
    #[must_use]
    pub fn rows(&self) -> Vec<MetricRow> {
        self.points.iter().map(MetricPoint::to_row).collect()
    }
}

/// Accumulates values per `(date, metric)`, summing duplicates.
#[derive(Debug)]
pub(crate) struct PointSet {
    platform: Platform,
    values: BTreeMap<(NaiveDate, String), f64>,
    skipped: usize,
}

impl PointSet {
    pub(crate) fn new(platform: Platform) -> Self {
        Self {
            platform,
            values: BTreeMap::new(),
            skipped: 0,
        }
    }

    pub(crate) fn add(&mut self, date: NaiveDate, metric: &str, value: f64) {
        *self.values.entry((date, snake_case(metric))).or_insert(0.0) += value;
    }

    pub(crate) fn skip(&mut self, count: usize) {
        self.skipped += count;
    }

    pub(crate) fn finish(self) -> Normalized {
        if self.skipped > 0 {
            tracing::warn!(platform = %self.platform, skipped = self.skipped, "Dropped unparseable metric values");
        }
        let platform = self.platform;
        Normalized {
            points: self
                .values
                .into_iter()
                .map(|((date, metric), value)| MetricPoint {
                    platform,
                    metric,
                    date,
                    value,
                })
                .collect(),
            skipped: self.skipped,
        }
    }
}

/// A JSON number, or a string holding one. Platforms send both.
pub(crate) fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// `costInLocalCurrency` → `cost_in_local_currency`.
pub(crate) fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '-' || c == ' ' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}
