//! Error taxonomy for chat operations

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Duplicate chat creation. Resolved by re-fetching, never shown to users.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    /// Network or send failure on the client side
    #[error("Send failed: {0}")]
    Transient(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Stable machine-readable code, shared by HTTP bodies and websocket events
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Transient(_) => "TRANSIENT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
