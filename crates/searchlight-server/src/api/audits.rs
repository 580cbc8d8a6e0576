//! Audit lifecycle endpoints.
//!
//! Creating an audit arms its first batch through the runner's continuation
//! trigger. Each batch ends by arming the next one, which arrives at
//! `/continue`. Pollers of the active-audit endpoint sweep their tenant first
//! so an abandoned audit surfaces as failed instead of spinning forever.

use super::{audit_id, org_id};
use crate::error::{ApiError, ApiResult};
use crate::{AppState, AuthUser, MAX_PAGES_LIMIT};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use searchlight_core::{time, AuditId, AuditKind};
use searchlight_crawler::Scope;
use searchlight_db::{
    audit_pages::{self, AuditPage, PageCounts, PageStatus},
    audits::{self, Audit},
};
use searchlight_permissions::Permission;
use searchlight_runner::{sweep_organization, CONTINUATION_SECRET_HEADER};
use serde::{Deserialize, Serialize};

const LIST_LIMIT: i64 = 100;

/// POST audit request
#[derive(Debug, Deserialize)]
pub struct CreateAuditRequest {
    /// Site to audit
    pub target_url: String,
    /// SEO or GEO
    #[serde(default = "default_kind")]
    pub kind: AuditKind,
    /// Page limit; the configured default when absent
    pub max_pages: Option<i64>,
}

fn default_kind() -> AuditKind {
    AuditKind::Seo
}

/// Active-audit poll response
#[derive(Debug, Serialize)]
pub struct ActiveAuditResponse {
    /// The most recent in-progress audit
    pub audit: Option<Audit>,
    /// Its page counts
    pub progress: Option<PageCounts>,
}

/// Page list filter
#[derive(Debug, Deserialize)]
pub struct PagesQuery {
    /// Only pages in this state
    pub status: Option<PageStatus>,
}

/// POST /api/organizations/:org/audits
pub async fn create_audit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org): Path<String>,
    Json(request): Json<CreateAuditRequest>,
) -> ApiResult<(StatusCode, Json<Audit>)> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::RunAudits)?;

    let scope = Scope::new(&request.target_url)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let target = scope.root().as_str();
    let max_pages = request.max_pages.unwrap_or(state.settings.default_max_pages);
    if !(1..=MAX_PAGES_LIMIT).contains(&max_pages) {
        return Err(ApiError::BadRequest(format!(
            "max_pages must be between 1 and {MAX_PAGES_LIMIT}"
        )));
    }

    let pool = state.db.pool();
    if let Some(active) = audits::find_in_progress_for_target(pool, &org, target).await? {
        return Err(ApiError::Conflict(format!(
            "audit {} is already running for {target}",
            active.id
        )));
    }

    let audit = audits::create_audit(
        pool,
        &org,
        Some(&auth.user.id),
        target,
        request.kind,
        max_pages,
    )
    .await?;

    // A lost first trigger is recovered by the sweeper's re-arm.
    if let Err(e) = state.runner.trigger().schedule(&audit.id).await {
        tracing::warn!(audit_id = %audit.id, error = %e, "Failed to trigger first batch");
    }

    Ok((StatusCode::ACCEPTED, Json(audit)))
}

/// GET /api/organizations/:org/audits
pub async fn list_audits(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org): Path<String>,
) -> ApiResult<Json<Vec<Audit>>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ViewAudits)?;
    Ok(Json(
        audits::list_by_organization(state.db.pool(), &org, LIST_LIMIT).await?,
    ))
}

/// GET /api/organizations/:org/audits/active
pub async fn active_audit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org): Path<String>,
) -> ApiResult<Json<ActiveAuditResponse>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ViewAudits)?;

    let report = sweep_organization(
        &state.db,
        &org,
        &state.settings.sweep,
        state.runner.trigger().as_ref(),
        Utc::now(),
    )
    .await?;
    if !report.is_empty() {
        tracing::info!(
            organization_id = %org,
            failed = report.failed.len(),
            rearmed = report.rearmed.len(),
            "Poll-time sweep changed audits"
        );
    }

    let pool = state.db.pool();
    let audit = audits::find_active(pool, &org).await?;
    let progress = match &audit {
        Some(a) => Some(audit_pages::count_by_status(pool, &a.id).await?),
        None => None,
    };
    Ok(Json(ActiveAuditResponse { audit, progress }))
}

/// GET /api/audits/:id
pub async fn get_audit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Audit>> {
    let audit = visible_audit(&state, &auth, &audit_id(id)?).await?;
    auth.require(&state, &audit.organization_id, Permission::ViewAudits)?;
    Ok(Json(audit))
}

/// GET /api/audits/:id/pages
pub async fn list_pages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<PagesQuery>,
) -> ApiResult<Json<Vec<AuditPage>>> {
    let audit = visible_audit(&state, &auth, &audit_id(id)?).await?;
    auth.require(&state, &audit.organization_id, Permission::ViewAudits)?;
    Ok(Json(
        audit_pages::list_for_audit(state.db.pool(), &audit.id, query.status).await?,
    ))
}

/// POST /api/audits/:id/cancel
pub async fn cancel_audit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Audit>> {
    let audit = visible_audit(&state, &auth, &audit_id(id)?).await?;
    auth.require(&state, &audit.organization_id, Permission::CancelAudits)?;

    let pool = state.db.pool();
    if !audits::cancel(pool, &audit.id, &time::now()).await? {
        return Err(ApiError::Conflict(format!(
            "audit is already {}",
            audit.status
        )));
    }
    let audit = audits::get(pool, &audit.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Audit not found".to_string()))?;
    Ok(Json(audit))
}

/// POST /api/audits/:id/continue
///
/// Runs the next batch in the background and answers immediately. Only
/// callers presenting the continuation secret are accepted.
pub async fn continue_audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let Some(expected) = state.settings.continuation_secret.as_deref() else {
        return Err(ApiError::NotFound("continuations are not enabled".to_string()));
    };
    let presented = headers
        .get(CONTINUATION_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected) {
        return Err(ApiError::Unauthorized("invalid continuation secret".to_string()));
    }

    let id = audit_id(id)?;
    if audits::get(state.db.pool(), &id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Audit '{id}' not found")));
    }

    let runner = state.runner.clone();
    tokio::spawn(async move {
        match runner.run_batch(&id).await {
            Ok(outcome) => tracing::debug!(audit_id = %id, ?outcome, "Continuation batch finished"),
            Err(e) => tracing::error!(audit_id = %id, error = %e, "Continuation batch failed"),
        }
    });

    Ok(StatusCode::ACCEPTED)
}

/// Load an audit, hiding other tenants' audits behind a 404.
async fn visible_audit(state: &AppState, auth: &AuthUser, id: &AuditId) -> ApiResult<Audit> {
    audits::get(state.db.pool(), id)
        .await?
        .filter(|a| a.organization_id == auth.user.organization_id)
        .ok_or_else(|| ApiError::NotFound(format!("Audit '{id}' not found")))
}

/// Build audit routes
pub fn audit_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/organizations/:org/audits",
            post(create_audit).get(list_audits),
        )
        .route("/api/organizations/:org/audits/active", get(active_audit))
        .route("/api/audits/:id", get(get_audit))
        .route("/api/audits/:id/pages", get(list_pages))
        .route("/api/audits/:id/cancel", post(cancel_audit))
        .route("/api/audits/:id/continue", post(continue_audit))
}
