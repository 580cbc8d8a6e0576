//! Per-platform payload normalizers.
//!
//! Each normalizer takes the raw JSON body a platform's reporting API returns
//! and produces daily [`MetricPoint`](crate::MetricPoint)s. A payload with the
//! wrong overall shape is an error; individual rows with an unparseable date
//! or value are dropped and counted in [`Normalized::skipped`].

mod ga4;
mod hubspot;
mod linkedin;

pub use ga4::normalize_ga4;
pub use hubspot::normalize_hubspot;
pub use linkedin::normalize_linkedin;

use crate::error::Result;
use crate::platform::Platform;
use crate::point::Normalized;
use serde_json::Value;

/// Normalize a payload from `platform`.
pub fn normalize(platform: Platform, payload: &Value) -> Result<Normalized> {
    let normalized = match platform {
        Platform::Linkedin => normalize_linkedin(payload)?,
        Platform::GoogleAnalytics => normalize_ga4(payload)?,
        Platform::Hubspot => normalize_hubspot(payload)?,
    };
    tracing::debug!(
        platform = %platform,
        points = normalized.points.len(),
        skipped = normalized.skipped,
        "Payload normalized"
    );
    Ok(normalized)
}
