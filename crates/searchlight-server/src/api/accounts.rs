//! Signup, sessions and the organization settings.

use super::org_id;
use crate::auth::bearer_token;
use crate::error::{ApiError, ApiResult};
use crate::{AppState, AuthUser};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, patch, post},
    Json, Router,
};
use searchlight_core::Role;
use searchlight_db::{
    organizations::{self, Organization},
    sessions,
    users::{self, User},
};
use searchlight_permissions::{role_permissions, Permission};
use serde::{Deserialize, Serialize};

/// POST /api/signup request
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    /// Organization display name
    pub organization_name: String,
    /// Organization handle
    pub slug: String,
    /// Admin's email
    pub email: String,
    /// Admin's name
    pub display_name: String,
}

/// A new session, returned by signup and invite acceptance.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// The user's organization
    pub organization: Organization,
    /// The signed-in user
    pub user: User,
    /// Bearer token
    pub token: String,
}

/// GET /api/me response
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// The signed-in user
    pub user: User,
    /// Their organization
    pub organization: Organization,
    /// What their role allows
    pub permissions: &'static [Permission],
}

/// PATCH /api/organizations/:org request
#[derive(Debug, Deserialize)]
pub struct UpdateOrganizationRequest {
    /// New display name
    pub name: String,
}

/// POST /api/signup
///
/// Creates an organization with its first admin and signs them in.
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    if request.display_name.trim().is_empty() {
        return Err(ApiError::BadRequest("display name must not be empty".to_string()));
    }
    let pool = state.db.pool();
    if users::get_by_email(pool, &request.email).await?.is_some() {
        return Err(ApiError::Conflict("email already registered".to_string()));
    }

    let organization =
        organizations::create_organization(pool, &request.organization_name, &request.slug).await?;
    let user = users::create_user(
        pool,
        &organization.id,
        &request.email,
        request.display_name.trim(),
        Role::Admin,
    )
    .await?;
    let token = sessions::create_session(pool, &user.id, state.settings.session_ttl).await?;

    tracing::info!(
        organization_id = %organization.id,
        user_id = %user.id,
        "Organization signed up"
    );

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            organization,
            user,
            token,
        }),
    ))
}

/// GET /api/me
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<MeResponse>> {
    let organization = organizations::get(state.db.pool(), &auth.user.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;

    Ok(Json(MeResponse {
        permissions: role_permissions(auth.user.role),
        user: auth.user,
        organization,
    }))
}

/// DELETE /api/session
///
/// Signs out by revoking the bearer token the request was made with.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    if let Some(token) = bearer_token(&headers) {
        sessions::revoke(state.db.pool(), token).await?;
    }
    tracing::debug!(user_id = %auth.user.id, "Session revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/organizations/:org
pub async fn update_organization(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org): Path<String>,
    Json(request): Json<UpdateOrganizationRequest>,
) -> ApiResult<Json<Organization>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ManageOrganization)?;
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("organization name must not be empty".to_string()));
    }

    let pool = state.db.pool();
    organizations::rename(pool, &org, &request.name).await?;
    let organization = organizations::get(pool, &org)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;
    tracing::info!(organization_id = %org, renamed_by = %auth.user.id, "Organization renamed");
    Ok(Json(organization))
}

/// Build account routes
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/signup", post(signup))
        .route("/api/me", get(me))
        .route("/api/session", delete(logout))
        .route("/api/organizations/:org", patch(update_organization))
}
