use crate::error::{MetricsError, Result};
use crate::platform::Platform;
use crate::point::{numeric, Normalized, PointSet};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReportResponse {
    #[serde(default)]
    dimension_headers: Vec<Header>,
    #[serde(default)]
    metric_headers: Vec<Header>,
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    #[serde(default)]
    dimension_values: Vec<CellValue>,
    #[serde(default)]
    metric_values: Vec<CellValue>,
}

#[derive(Debug, Deserialize)]
struct CellValue {
    #[serde(default)]
    value: Value,
}

/// Normalize a Data API `runReport` response.
///
/// The report must carry a `date` dimension (`YYYYMMDD`). Every metric header
/// becomes a metric; rows split by further dimensions are summed per day.
pub fn normalize_ga4(payload: &Value) -> Result<Normalized> {
    let report = RunReportResponse::deserialize(payload).map_err(|e| invalid(&e.to_string()))?;

    let date_index = report
        .dimension_headers
        .iter()
        .position(|h| h.name == "date")
        .ok_or_else(|| invalid("report has no 'date' dimension"))?;
    if report.metric_headers.is_empty() {
        return Err(invalid("report has no metric headers"));
    }

    let mut set = PointSet::new(Platform::GoogleAnalytics);
    for row in &report.rows {
        let date = row
            .dimension_values
            .get(date_index)
            .and_then(|cell| cell.value.as_str())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y%m%d").ok());
        let Some(date) = date else {
            set.skip(report.metric_headers.len());
            continue;
        };

        for (i, header) in report.metric_headers.iter().enumerate() {
            match row.metric_values.get(i).and_then(|cell| numeric(&cell.value)) {
                Some(value) => set.add(date, &header.name, value),
                None => set.skip(1),
            }
        }
    }
    Ok(set.finish())
}

fn invalid(reason: &str) -> MetricsError {
    MetricsError::InvalidPayload {
        platform: Platform::GoogleAnalytics.as_str(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(rows: Value) -> Value {
        json!({
            "dimensionHeaders": [{"name": "date"}, {"name": "sessionDefaultChannelGroup"}],
            "metricHeaders": [
                {"name": "sessions", "type": "TYPE_INTEGER"},
                {"name": "activeUsers", "type": "TYPE_INTEGER"}
            ],
            "rows": rows,
            "rowCount": 3
        })
    }

    fn row(date: &str, channel: &str, sessions: &str, users: &str) -> Value {
        json!({
            "dimensionValues": [{"value": date}, {"value": channel}],
            "metricValues": [{"value": sessions}, {"value": users}]
        })
    }

    #[test]
    fn test_rows_summed_per_day() {
        let payload = report(json!([
            row("20260301", "Organic Search", "120", "90"),
            row("20260301", "Direct", "30", "25"),
            row("20260302", "Organic Search", "100", "80"),
        ]));

        let normalized = normalize_ga4(&payload).expect("normalize");
        assert_eq!(normalized.skipped, 0);
        let values: Vec<(String, &str, f64)> = normalized
            .points
            .iter()
            .map(|p| (p.date.to_string(), p.metric.as_str(), p.value))
            .collect();
        assert_eq!(
            values,
            vec![
                ("2026-03-01".to_string(), "active_users", 115.0),
                ("2026-03-01".to_string(), "sessions", 150.0),
                ("2026-03-02".to_string(), "active_users", 80.0),
                ("2026-03-02".to_string(), "sessions", 100.0),
            ]
        );
    }

    #[test]
    fn test_bad_date_and_value_skipped() {
        let payload = report(json!([
            row("2026-03-01", "Direct", "1", "1"),
            row("20260302", "Direct", "", "4"),
        ]));
        let normalized = normalize_ga4(&payload).expect("normalize");
        assert_eq!(normalized.skipped, 3);
        assert_eq!(normalized.points.len(), 1);
        assert_eq!(normalized.points[0].metric, "active_users");
    }

    #[test]
    fn test_missing_date_dimension_rejected() {
        let payload = json!({
            "dimensionHeaders": [{"name": "country"}],
            "metricHeaders": [{"name": "sessions"}],
            "rows": []
        });
        assert!(normalize_ga4(&payload).is_err());
    }

    #[test]
    fn test_empty_report_has_no_rows_field() {
        // GA4 omits `rows` when the range has no data
        let payload = json!({
            "dimensionHeaders": [{"name": "date"}],
            "metricHeaders": [{"name": "sessions"}]
        });
        let normalized = normalize_ga4(&payload).expect("normalize");
        assert!(normalized.points.is_empty());
    }
}
