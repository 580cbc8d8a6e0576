//! Team members and invites.

use super::{org_id, user_id};
use crate::api::accounts::SessionResponse;
use crate::error::{ApiError, ApiResult};
use crate::{AppState, AuthUser};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use searchlight_core::{time, OrganizationId, Role, UserId};
use searchlight_db::{
    invites::{self, Invite},
    organizations, sessions,
    users::{self, User},
};
use searchlight_permissions::{can_assign_role, Permission};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

/// PATCH member request
#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    /// New role
    pub role: Role,
}

/// POST invite request
#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    /// Invitee's email
    pub email: String,
    /// Role granted on acceptance
    pub role: Role,
}

/// POST invite response. Delivering the token is up to the caller.
#[derive(Debug, Serialize)]
pub struct CreateInviteResponse {
    /// The stored invite
    pub invite: Invite,
    /// Raw acceptance token
    pub token: String,
}

/// POST /api/invites/accept request
#[derive(Debug, Deserialize)]
pub struct AcceptInviteRequest {
    /// Raw token from the invite
    pub token: String,
    /// Name for the new account
    pub display_name: String,
}

/// GET /api/organizations/:org/members
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org): Path<String>,
) -> ApiResult<Json<Vec<User>>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ViewTeam)?;
    Ok(Json(users::list_by_organization(state.db.pool(), &org).await?))
}

/// PATCH /api/organizations/:org/members/:user
pub async fn update_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org, user)): Path<(String, String)>,
    Json(request): Json<UpdateMemberRequest>,
) -> ApiResult<Json<User>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ManageTeam)?;
    if !can_assign_role(auth.user.role, request.role) {
        return Err(ApiError::Forbidden(format!(
            "{} may not assign {}",
            auth.user.role, request.role
        )));
    }

    let pool = state.db.pool();
    let member = member_of(pool, &org, &user_id(user)?).await?;
    users::update_role(pool, &org, &member.id, request.role).await?;
    Ok(Json(User {
        role: request.role,
        ..member
    }))
}

/// DELETE /api/organizations/:org/members/:user
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org, user)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ManageTeam)?;

    let pool = state.db.pool();
    let member = member_of(pool, &org, &user_id(user)?).await?;
    users::delete(pool, &org, &member.id).await?;
    tracing::info!(organization_id = %org, user_id = %member.id, removed_by = %auth.user.id, "Member removed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/organizations/:org/invites
pub async fn create_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org): Path<String>,
    Json(request): Json<CreateInviteRequest>,
) -> ApiResult<(StatusCode, Json<CreateInviteResponse>)> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ManageTeam)?;
    if !can_assign_role(auth.user.role, request.role) {
        return Err(ApiError::Forbidden(format!(
            "{} may not invite a {}",
            auth.user.role, request.role
        )));
    }

    let pool = state.db.pool();
    if users::get_by_email(pool, &request.email).await?.is_some() {
        return Err(ApiError::Conflict("email already registered".to_string()));
    }

    let (invite, token) = invites::create_invite(
        pool,
        &org,
        &request.email,
        request.role,
        Some(&auth.user.id),
        state.settings.invite_ttl,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(CreateInviteResponse { invite, token })))
}

/// GET /api/organizations/:org/invites
pub async fn list_invites(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org): Path<String>,
) -> ApiResult<Json<Vec<Invite>>> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ManageTeam)?;
    Ok(Json(
        invites::list_pending(state.db.pool(), &org, &time::now()).await?,
    ))
}

/// DELETE /api/organizations/:org/invites/:invite
pub async fn revoke_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org, invite)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let org = org_id(org)?;
    auth.require(&state, &org, Permission::ManageTeam)?;

    invites::revoke(state.db.pool(), &org, &invite).await?;
    tracing::info!(organization_id = %org, invite_id = %invite, revoked_by = %auth.user.id, "Invite revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/invites/accept
///
/// Creates the invitee's account and signs them in. A second acceptance of the
/// same invite fails with a conflict.
pub async fn accept_invite(
    State(state): State<AppState>,
    Json(request): Json<AcceptInviteRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    if request.display_name.trim().is_empty() {
        return Err(ApiError::BadRequest("display name must not be empty".to_string()));
    }

    let pool = state.db.pool();
    let (invite, user) = invites::accept(
        pool,
        request.token.trim(),
        request.display_name.trim(),
        &time::now(),
    )
    .await?;

    let organization = organizations::get(pool, &invite.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;
    let token = sessions::create_session(pool, &user.id, state.settings.session_ttl).await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            organization,
            user,
            token,
        }),
    ))
}

async fn member_of(pool: &Pool<Sqlite>, org: &OrganizationId, id: &UserId) -> ApiResult<User> {
    users::get(pool, id)
        .await?
        .filter(|u| u.organization_id == *org)
        .ok_or_else(|| ApiError::NotFound(format!("User '{id}' not found")))
}

/// Build team routes
pub fn team_routes() -> Router<AppState> {
    Router::new()
        .route("/api/organizations/:org/members", get(list_members))
        .route(
            "/api/organizations/:org/members/:user",
            patch(update_member).delete(remove_member),
        )
        .route(
            "/api/organizations/:org/invites",
            post(create_invite).get(list_invites),
        )
        .route("/api/organizations/:org/invites/:invite", delete(revoke_invite))
        .route("/api/invites/accept", post(accept_invite))
}
