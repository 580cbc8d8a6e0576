//! Bearer-token authentication.

use crate::error::ApiError;
use crate::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use searchlight_core::{time, OrganizationId};
use searchlight_db::{sessions, users::User};
use searchlight_permissions::{Permission, Principal};

/// The user a request is made for, resolved from `Authorization: Bearer`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Session owner
    pub user: User,
}

impl AuthUser {
    /// Principal for permission checks.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal::new(
            self.user.id.clone(),
            self.user.organization_id.clone(),
            self.user.role,
        )
    }

    /// Require `permission` on a resource owned by `organization_id`.
    pub fn require(
        &self,
        state: &AppState,
        organization_id: &OrganizationId,
        permission: Permission,
    ) -> Result<(), ApiError> {
        state
            .authorizer
            .authorize(&self.principal(), organization_id, permission)
            .map_err(ApiError::from)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        match sessions::resolve(state.db.pool(), token, &time::now()).await? {
            Some(user) => Ok(Self { user }),
            None => Err(ApiError::Unauthorized(
                "invalid or expired session".to_string(),
            )),
        }
    }
}

/// Token of an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers("bearer  abc123 ")), Some("abc123"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
