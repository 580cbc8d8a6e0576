//! Supported marketing platforms.

use crate::error::{MetricsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A platform whose metrics can be ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// `LinkedIn` Marketing API ad analytics
    Linkedin,
    /// Google Analytics 4 Data API
    GoogleAnalytics,
    /// `HubSpot` analytics
    Hubspot,
}

impl Platform {
    /// Every platform.
    pub const ALL: [Platform; 3] = [Self::Linkedin, Self::GoogleAnalytics, Self::Hubspot];

    /// Storage and URL form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linkedin => "linkedin",
            Self::GoogleAnalytics => "google_analytics",
            Self::Hubspot => "hubspot",
        }
    }

    /// Parse the storage form.
    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| MetricsError::UnknownPlatform(s.to_string()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
