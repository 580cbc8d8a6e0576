//! The role → permission matrix.

use crate::Permission;
use searchlight_core::Role;

/// Permissions carried by a role.
#[must_use]
pub fn role_permissions(role: Role) -> &'static [Permission] {
    use Permission::{
        CancelAudits, ManageIntegrations, RunAudits, ViewAudits, ViewMetrics, ViewTeam,
    };

    match role {
        Role::Admin => &Permission::ALL,
        Role::TeamMember => &[
            ViewTeam,
            RunAudits,
            ViewAudits,
            CancelAudits,
            ViewMetrics,
            ManageIntegrations,
        ],
        Role::ClientViewer => &[ViewAudits, ViewMetrics],
        Role::ExternalDeveloper => &[RunAudits, ViewAudits],
    }
}

/// Whether a role carries a permission.
#[must_use]
pub fn role_has(role: Role, permission: Permission) -> bool {
    role_permissions(role).contains(&permission)
}

/// Only admins hand out roles, and they may hand out any of them.
#[must_use]
pub fn can_assign_role(actor: Role, _role: Role) -> bool {
    actor == Role::Admin
}
