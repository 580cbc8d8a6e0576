//! Shared types used across the Searchlight service.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::SearchlightError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("UUID regex is hardcoded and valid")
});

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "` from a string.")]
            ///
            /// # Errors
            /// Returns error if the ID is not a valid lowercase UUID v4.
            pub fn new(id: impl Into<String>) -> Result<Self, SearchlightError> {
                let id = id.into();
                if UUID_PATTERN.is_match(&id) {
                    Ok(Self(id))
                } else {
                    Err(SearchlightError::Validation(format!(
                        concat!("invalid ", $label, " ID: must be a valid UUID v4, got '{}'"),
                        id
                    )))
                }
            }

            #[doc = concat!("Create a new random `", stringify!($name), "` using UUID v4.")]
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of a tenant organization.
    OrganizationId,
    "organization"
);
uuid_newtype!(
    /// Identifier of a user account.
    UserId,
    "user"
);
uuid_newtype!(
    /// Identifier of an audit run.
    AuditId,
    "audit"
);

/// Role of a user inside their organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full control over the organization, team and integrations
    Admin,
    /// Agency staff running audits and managing integrations
    TeamMember,
    /// Client-side stakeholder with read-only access
    ClientViewer,
    /// Outside developer who may run and read audits
    ExternalDeveloper,
}

impl Role {
    /// Database/wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::TeamMember => "team_member",
            Self::ClientViewer => "client_viewer",
            Self::ExternalDeveloper => "external_developer",
        }
    }

    /// Parse from the database/wire representation.
    ///
    /// # Errors
    /// Returns a validation error for unknown role names.
    pub fn parse(s: &str) -> Result<Self, SearchlightError> {
        match s {
            "admin" => Ok(Self::Admin),
            "team_member" => Ok(Self::TeamMember),
            "client_viewer" => Ok(Self::ClientViewer),
            "external_developer" => Ok(Self::ExternalDeveloper),
            other => Err(SearchlightError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an audit measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// Technical SEO and performance signals
    Seo,
    /// AI readiness scored by an LLM
    Geo,
}

impl AuditKind {
    /// Database/wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seo => "seo",
            Self::Geo => "geo",
        }
    }

    /// Parse from the database/wire representation.
    ///
    /// # Errors
    /// Returns a validation error for unknown kinds.
    pub fn parse(s: &str) -> Result<Self, SearchlightError> {
        match s {
            "seo" => Ok(Self::Seo),
            "geo" => Ok(Self::Geo),
            other => Err(SearchlightError::Validation(format!(
                "unknown audit kind '{other}'"
            ))),
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an audit row.
///
/// ```text
/// pending ──claim──▶ crawling ──release──▶ batch_complete ──claim──▶ crawling ...
///                       │                                              │
///                       └──────────────▶ completed / failed ◀──────────┘
/// ```
/// Any non-terminal state may move to `cancelled`; in-progress states move to
/// `failed` when they go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Created, first batch not yet claimed
    Pending,
    /// A worker holds the claim and is crawling
    Crawling,
    /// A batch finished and the next one awaits a claim
    BatchComplete,
    /// All pages crawled and scored
    Completed,
    /// Aborted by an error or by the staleness sweep
    Failed,
    /// Stopped by a user
    Cancelled,
}

impl AuditStatus {
    /// All statuses considered in progress.
    pub const IN_PROGRESS: [Self; 3] = [Self::Pending, Self::Crawling, Self::BatchComplete];

    /// Database/wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::BatchComplete => "batch_complete",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from the database/wire representation.
    ///
    /// # Errors
    /// Returns a validation error for unknown statuses.
    pub fn parse(s: &str) -> Result<Self, SearchlightError> {
        match s {
            "pending" => Ok(Self::Pending),
            "crawling" => Ok(Self::Crawling),
            "batch_complete" => Ok(Self::BatchComplete),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(SearchlightError::Validation(format!(
                "unknown audit status '{other}'"
            ))),
        }
    }

    /// No further transitions are possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// The audit still has work outstanding.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        !self.is_terminal()
    }

    /// A worker may claim the next batch from this state.
    #[must_use]
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Pending | Self::BatchComplete)
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
