use crate::error::{MetricsError, Result};
use crate::platform::Platform;
use crate::point::{numeric, Normalized, PointSet};
use chrono::NaiveDate;
use serde_json::Value;

/// Source field → metric name.
const FIELDS: [(&str, &str); 4] = [
    ("impressions", "impressions"),
    ("clicks", "clicks"),
    ("costInLocalCurrency", "spend"),
    ("externalWebsiteConversions", "conversions"),
];

/// Older report pivots name the conversion count plainly.
const LEGACY_CONVERSIONS: &str = "conversions";

/// Normalize an ad analytics response (`{"elements": [...]}`).
///
/// Each element's `dateRange.start` is the day its values belong to.
pub fn normalize_linkedin(payload: &Value) -> Result<Normalized> {
    let elements = payload
        .get("elements")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing 'elements' array"))?;

    let mut set = PointSet::new(Platform::Linkedin);
    for element in elements {
        let mut present: Vec<(&str, &Value)> = FIELDS
            .iter()
            .filter_map(|(field, metric)| element.get(*field).map(|v| (*metric, v)))
            .collect();
        if element.get("externalWebsiteConversions").is_none() {
            if let Some(v) = element.get(LEGACY_CONVERSIONS) {
                present.push(("conversions", v));
            }
        }

        let Some(date) = start_date(element) else {
            set.skip(present.len().max(1));
            continue;
        };

        for (metric, raw) in present {
            match numeric(raw) {
                Some(value) => set.add(date, metric, value),
                None => set.skip(1),
            }
        }
    }
    Ok(set.finish())
}

fn start_date(element: &Value) -> Option<NaiveDate> {
    let start = element.get("dateRange")?.get("start")?;
    let part = |key: &str| start.get(key).and_then(Value::as_u64);
    NaiveDate::from_ymd_opt(
        i32::try_from(part("year")?).ok()?,
        u32::try_from(part("month")?).ok()?,
        u32::try_from(part("day")?).ok()?,
    )
}

fn invalid(reason: &str) -> MetricsError {
    MetricsError::InvalidPayload {
        platform: Platform::Linkedin.as_str(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn element(day: u64, clicks: Value, cost: Value) -> Value {
        json!({
            "dateRange": {
                "start": {"day": day, "month": 3, "year": 2026},
                "end": {"day": day, "month": 3, "year": 2026}
            },
            "impressions": 1000,
            "clicks": clicks,
            "costInLocalCurrency": cost,
            "externalWebsiteConversions": 4
        })
    }

    #[test]
    fn test_elements_become_daily_points() {
        let payload = json!({"elements": [
            element(1, json!(25), json!("12.50")),
            element(2, json!(30), json!("20.00")),
        ]});

        let normalized = normalize_linkedin(&payload).expect("normalize");
        assert_eq!(normalized.skipped, 0);
        assert_eq!(normalized.points.len(), 8);

        let first_day: Vec<(&str, f64)> = normalized
            .points
            .iter()
            .filter(|p| p.date == NaiveDate::from_ymd_opt(2026, 3, 1).expect("date"))
            .map(|p| (p.metric.as_str(), p.value))
            .collect();
        assert_eq!(
            first_day,
            vec![
                ("clicks", 25.0),
                ("conversions", 4.0),
                ("impressions", 1000.0),
                ("spend", 12.5)
            ]
        );
    }

    #[test]
    fn test_bad_rows_are_skipped_and_counted() {
        let mut bad_date = element(1, json!(5), json!("1.00"));
        bad_date["dateRange"]["start"]["month"] = json!(13);
        let payload = json!({"elements": [
            bad_date,
            element(2, json!("lots"), json!("3.00")),
        ]});

        let normalized = normalize_linkedin(&payload).expect("normalize");
        // four values lost with the bad date, one unparseable click count
        assert_eq!(normalized.skipped, 5);
        assert_eq!(normalized.points.len(), 3);
        assert!(normalized.points.iter().all(|p| p.metric != "clicks"));
    }

    #[test]
    fn test_legacy_conversions_field() {
        let payload = json!({"elements": [{
            "dateRange": {"start": {"day": 5, "month": 3, "year": 2026}},
            "conversions": 2
        }]});
        let normalized = normalize_linkedin(&payload).expect("normalize");
        assert_eq!(normalized.points.len(), 1);
        assert_eq!(normalized.points[0].metric, "conversions");
    }

    #[test]
    fn test_wrong_shape_is_an_error() {
        assert!(matches!(
            normalize_linkedin(&json!({"paging": {}})),
            Err(MetricsError::InvalidPayload { platform: "linkedin", .. })
        ));
    }
}
