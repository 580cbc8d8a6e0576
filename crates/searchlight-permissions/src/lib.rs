//! Searchlight Permissions - role-based access control for tenant resources.
//!
//! Every request made on behalf of a user is checked against two rules:
//! - the resource must belong to the user's own organization, and
//! - the user's role must carry the permission the action needs.
//!
//! # Example
//!
//! ```rust
//! use searchlight_core::{OrganizationId, Role, UserId};
//! use searchlight_permissions::{Authorizer, Permission, Principal};
//!
//! let org = OrganizationId::generate();
//! let principal = Principal::new(UserId::generate(), org.clone(), Role::ClientViewer);
//! let authorizer = Authorizer::new();
//!
//! assert!(authorizer.authorize(&principal, &org, Permission::ViewAudits).is_ok());
//! assert!(authorizer.authorize(&principal, &org, Permission::RunAudits).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod access_log;
mod authorizer;
mod matrix;

pub use access_log::{AccessEntry, AccessLog, AccessOutcome};
pub use authorizer::Authorizer;
pub use matrix::{can_assign_role, role_permissions, role_has};

use searchlight_core::{OrganizationId, Role, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by authorization checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// The role does not carry the permission
    #[error("permission denied: {role} may not {permission}")]
    Denied {
        /// Caller's role
        role: Role,
        /// Permission that was required
        permission: Permission,
    },

    /// The resource belongs to another organization
    #[error("resource belongs to another organization")]
    CrossTenant,
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermissionError>;

/// An action a user may be allowed to take inside their organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Rename the organization and change its settings
    ManageOrganization,
    /// Invite, remove and re-role members
    ManageTeam,
    /// See the member list
    ViewTeam,
    /// Start audits
    RunAudits,
    /// Read audits and their pages
    ViewAudits,
    /// Stop running audits
    CancelAudits,
    /// Connect platforms and ingest metrics
    ManageIntegrations,
    /// Read campaign metrics and connections
    ViewMetrics,
}

impl Permission {
    /// Every permission, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::ManageOrganization,
        Self::ManageTeam,
        Self::ViewTeam,
        Self::RunAudits,
        Self::ViewAudits,
        Self::CancelAudits,
        Self::ManageIntegrations,
        Self::ViewMetrics,
    ];

    /// Short verb phrase used in logs and error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageOrganization => "manage_organization",
            Self::ManageTeam => "manage_team",
            Self::ViewTeam => "view_team",
            Self::RunAudits => "run_audits",
            Self::ViewAudits => "view_audits",
            Self::CancelAudits => "cancel_audits",
            Self::ManageIntegrations => "manage_integrations",
            Self::ViewMetrics => "view_metrics",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated user an action is performed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Acting user
    pub user_id: UserId,
    /// The user's organization
    pub organization_id: OrganizationId,
    /// The user's role in that organization
    pub role: Role,
}

impl Principal {
    /// Create a principal.
    #[must_use]
    pub fn new(user_id: UserId, organization_id: OrganizationId, role: Role) -> Self {
        Self {
            user_id,
            organization_id,
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_serialization() {
        let json = serde_json::to_string(&Permission::ManageIntegrations).expect("serialize");
        assert_eq!(json, "\"manage_integrations\"");
        assert_eq!(Permission::RunAudits.to_string(), "run_audits");
    }

    #[test]
    fn test_error_messages() {
        let err = PermissionError::Denied {
            role: Role::ClientViewer,
            permission: Permission::RunAudits,
        };
        assert_eq!(err.to_string(), "permission denied: client_viewer may not run_audits");
    }
}
