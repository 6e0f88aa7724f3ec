//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use livechat_shared::ChatError;
use serde_json::json;

use crate::auth::{JwtError, PasswordError};
use crate::store::StoreError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Resource errors
    #[error("Resource not found")]
    NotFound,
    #[error("Resource already exists")]
    Conflict(String),

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Authentication
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                self.to_string(),
            ),
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),

            // Validation
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),

            // Resources
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),

            // Internal
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database error".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                self.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotFound(_) => ApiError::NotFound,
            ChatError::Forbidden(_) => ApiError::Forbidden,
            ChatError::Conflict(msg) => ApiError::Conflict(msg),
            ChatError::Unauthorized(_) => ApiError::Unauthorized,
            ChatError::Transient(_) => ApiError::ServiceUnavailable,
            ChatError::Validation(msg) => ApiError::Validation(msg),
            ChatError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal chat error");
                ApiError::Internal
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => ApiError::Conflict("Resource already exists".to_string()),
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Corrupt(msg) => {
                tracing::error!(error = %msg, "Corrupt record");
                ApiError::Internal
            }
            StoreError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                ApiError::Database(e.to_string())
            }
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired | JwtError::Invalid | JwtError::Validation(_) => {
                ApiError::InvalidToken
            }
            JwtError::Encoding(msg) => {
                tracing::error!(error = %msg, "Token encoding failed");
                ApiError::Internal
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "Password hashing failed");
        ApiError::Internal
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_status_mapping() {
        let cases = [
            (ChatError::NotFound("chat".into()), StatusCode::NOT_FOUND),
            (ChatError::Forbidden("chat".into()), StatusCode::FORBIDDEN),
            (ChatError::Unauthorized("token".into()), StatusCode::UNAUTHORIZED),
            (ChatError::Validation("empty".into()), StatusCode::BAD_REQUEST),
            (ChatError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let response = ApiError::from(StoreError::Duplicate).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_expired_token_maps_to_invalid_token() {
        assert!(matches!(ApiError::from(JwtError::Expired), ApiError::InvalidToken));
    }
}
