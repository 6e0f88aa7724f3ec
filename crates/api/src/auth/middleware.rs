//! Authentication middleware

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use livechat_shared::UserRole;
use uuid::Uuid;

use super::jwt::JwtManager;
use crate::error::{ApiError, ApiResult};
use crate::store::ChatStore;

/// Authenticated account attached to requests by [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// State needed to authenticate a request
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: Arc<JwtManager>,
    pub store: Arc<dyn ChatStore>,
}

impl AuthState {
    /// Validate a bearer token and load the account it names.
    ///
    /// The account is re-read so role changes and deletions apply to tokens
    /// issued earlier.
    pub async fn verify_bearer(&self, token: &str) -> ApiResult<AuthUser> {
        let claims = self.jwt_manager.validate_token(token)?;

        let user = self.store.find_user(claims.sub).await?.ok_or_else(|| {
            tracing::warn!(user_id = %claims.sub, "Token for unknown user");
            ApiError::Unauthorized
        })?;

        Ok(AuthUser {
            user_id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        })
    }
}

/// Extract the token from an `Authorization: Bearer` header
fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToOwned::to_owned)
}

/// Require a valid bearer token; inserts [`AuthUser`] into request extensions
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request).ok_or(ApiError::Unauthorized)?;
    let auth_user = auth_state.verify_bearer(&token).await?;

    tracing::debug!(user_id = %auth_user.user_id, role = %auth_user.role, "Request authenticated");

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Reject non-admin callers
pub fn require_admin(auth_user: &AuthUser) -> ApiResult<()> {
    if auth_user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
