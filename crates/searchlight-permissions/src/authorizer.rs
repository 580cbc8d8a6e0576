//! Authorization checks with decision logging.

use crate::access_log::{AccessEntry, AccessLog, AccessOutcome};
use crate::matrix::role_has;
use crate::{Permission, PermissionError, Principal, Result};
use searchlight_core::OrganizationId;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Checks principals against the role matrix and remembers recent decisions.
///
/// Cloning is cheap; clones share the same access log.
#[derive(Debug, Clone, Default)]
pub struct Authorizer {
    log: Arc<RwLock<AccessLog>>,
}

impl Authorizer {
    /// Create an authorizer with the default log capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an authorizer keeping at most `capacity` decisions.
    #[must_use]
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            log: Arc::new(RwLock::new(AccessLog::with_capacity(capacity))),
        }
    }

    /// Check that `principal` may perform `permission` on a resource owned
    /// by `target_org`.
    ///
    /// # Errors
    /// `PermissionError::CrossTenant` when the resource belongs to another
    /// organization, `PermissionError::Denied` when the role lacks the
    /// permission.
    pub fn authorize(
        &self,
        principal: &Principal,
        target_org: &OrganizationId,
        permission: Permission,
    ) -> Result<()> {
        let (outcome, result) = if principal.organization_id != *target_org {
            (AccessOutcome::CrossTenant, Err(PermissionError::CrossTenant))
        } else if role_has(principal.role, permission) {
            (AccessOutcome::Allowed, Ok(()))
        } else {
            (
                AccessOutcome::Denied,
                Err(PermissionError::Denied {
                    role: principal.role,
                    permission,
                }),
            )
        };

        match outcome {
            AccessOutcome::Allowed => debug!(
                user_id = %principal.user_id,
                role = %principal.role,
                %permission,
                "access allowed"
            ),
            AccessOutcome::Denied | AccessOutcome::CrossTenant => warn!(
                user_id = %principal.user_id,
                role = %principal.role,
                organization_id = %principal.organization_id,
                target_organization = %target_org,
                %permission,
                ?outcome,
                "access rejected"
            ),
        }

        self.log
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&principal.user_id, target_org, permission, outcome);

        result
    }

    /// The last `count` decisions, oldest first.
    #[must_use]
    pub fn recent_decisions(&self, count: usize) -> Vec<AccessEntry> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .recent(count)
    }
}
