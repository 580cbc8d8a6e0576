//! HTTP API handlers.

pub mod accounts;
pub mod audits;
pub mod health;
pub mod metrics;
pub mod team;

pub use accounts::account_routes;
pub use audits::audit_routes;
pub use health::health_routes;
pub use metrics::metrics_routes;
pub use team::team_routes;

use crate::error::ApiError;
use searchlight_core::{AuditId, OrganizationId, UserId};

pub(crate) fn org_id(raw: String) -> Result<OrganizationId, ApiError> {
    OrganizationId::new(raw).map_err(|_| ApiError::NotFound("Organization not found".to_string()))
}

pub(crate) fn user_id(raw: String) -> Result<UserId, ApiError> {
    UserId::new(raw).map_err(|_| ApiError::NotFound("User not found".to_string()))
}

pub(crate) fn audit_id(raw: String) -> Result<AuditId, ApiError> {
    AuditId::new(raw).map_err(|_| ApiError::NotFound("Audit not found".to_string()))
}
