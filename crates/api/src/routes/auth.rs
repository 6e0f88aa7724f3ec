//! Authentication routes: register, login and token verification

use axum::{extract::State, http::StatusCode, Extension, Json};
use livechat_shared::UserRole;
use serde::{Deserialize, Serialize};

use crate::{
    auth::{hash_password, validate_password, verify_password, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
    store::{NewUser, StoreError, UserProfile, UserRecord},
};

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 32;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserProfile,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create an account and sign it in
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let username = req.username.trim().to_string();
    let username_len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username_len) {
        return Err(ApiError::Validation(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }

    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }

    validate_password(&req.password).map_err(|e| ApiError::Validation(e.to_string()))?;

    let password_hash = hash_password(&req.password)?;
    let role = if state.config.is_admin_email(&email) {
        UserRole::Admin
    } else {
        UserRole::User
    };

    let user = state
        .store
        .insert_user(NewUser {
            username,
            email,
            password_hash,
            role,
        })
        .await
        .map_err(|e| match e {
            StoreError::Duplicate => {
                ApiError::Conflict("Username or email already registered".to_string())
            }
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    Ok((StatusCode::CREATED, Json(issue_token(&state, &user)?)))
}

/// Exchange email and password for an access token
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state
        .store
        .find_user_by_email(req.email.trim())
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "login: Invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(issue_token(&state, &user)?))
}

/// Confirm the bearer token is still good and return its account
pub async fn verify(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<VerifyResponse>> {
    let user = state
        .store
        .find_user(auth_user.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(VerifyResponse {
        valid: true,
        user: UserProfile::from(&user),
    }))
}

// =============================================================================
// Helpers
// =============================================================================

fn issue_token(state: &AppState, user: &UserRecord) -> ApiResult<AuthResponse> {
    let (access_token, _jti) =
        state
            .jwt_manager
            .generate_access_token(user.id, user.role, &user.username)?;

    Ok(AuthResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_manager.access_token_expiry_seconds(),
        user: UserProfile::from(user),
    })
}

fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > 254 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty() && !domain.is_empty() && !domain.contains('@')
}
