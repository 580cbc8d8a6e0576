use crate::error::{MetricsError, Result};
use crate::platform::Platform;
use crate::point::{numeric, Normalized, PointSet};
use chrono::NaiveDate;
use serde_json::Value;

/// Keys of a breakdown entry that are labels, not metrics.
const LABEL_KEYS: [&str; 2] = ["breakdown", "date"];

/// Normalize an analytics breakdown keyed by day:
/// `{"2026-03-01": [{"breakdown": "...", "visits": 12, "contacts": 1}]}`.
///
/// Numeric fields are summed across the entries of a day.
pub fn normalize_hubspot(payload: &Value) -> Result<Normalized> {
    let days = payload.as_object().ok_or_else(|| MetricsError::InvalidPayload {
        platform: Platform::Hubspot.as_str(),
        reason: "expected an object keyed by date".to_string(),
    })?;

    let mut set = PointSet::new(Platform::Hubspot);
    for (day, entries) in days {
        let entries = entries.as_array().map(Vec::as_slice).unwrap_or_default();
        let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") else {
            set.skip(entries.iter().map(metric_count).sum::<usize>().max(1));
            continue;
        };

        for entry in entries.iter().filter_map(Value::as_object) {
            for (key, raw) in entry {
                if LABEL_KEYS.contains(&key.as_str()) {
                    continue;
                }
                match numeric(raw) {
                    Some(value) => set.add(date, key, value),
                    None => set.skip(1),
                }
            }
        }
    }
    Ok(set.finish())
}

fn metric_count(entry: &Value) -> usize {
    entry.as_object().map_or(0, |fields| {
        fields
            .keys()
            .filter(|k| !LABEL_KEYS.contains(&k.as_str()))
            .count()
    })
}
