//! Canonical timestamp text format.
//!
//! Timestamps are stored as UTC text with fixed millisecond precision so that
//! lexicographic comparison in SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC instant in the canonical `YYYY-MM-DDTHH:MM:SS.mmmZ` form.
#[must_use]
pub fn format(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in canonical form.
#[must_use]
pub fn now() -> String {
    format(Utc::now())
}

/// Parse an RFC 3339 timestamp, returning `None` for malformed input.
#[must_use]
pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_is_fixed_width() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).single().expect("valid");
        assert_eq!(format(ts), "2026-03-01T09:05:00.000Z");
    }

    #[test]
    fn test_lexicographic_order_matches_time() {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 9, 59, 59).single().expect("valid");
        let later = base + Duration::milliseconds(1500);
        assert!(format(base) < format(later));
    }

    #[test]
    fn test_parse_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("valid");
        assert_eq!(parse(&format(ts)), Some(ts));
        assert_eq!(parse("yesterday"), None);
    }
}
