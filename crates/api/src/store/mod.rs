//! Persistence layer for chats, messages and accounts
//!
//! Handlers and services talk to [`ChatStore`] only. Two implementations exist:
//! [`PgChatStore`] for PostgreSQL and [`MemoryChatStore`] for tests and
//! single-process deployments.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use livechat_shared::{Chat, ChatError, Message, NewMessage, OwnerIdentity, UserRole};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

pub use memory::MemoryChatStore;
pub use postgres::PgChatStore;

/// Postgres SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

/// Errors returned by a [`ChatStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Record already exists")]
    Duplicate,
    #[error("Record not found")]
    NotFound,
    /// A stored row could not be turned back into a domain value
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return StoreError::Duplicate;
            }
        }

        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => ChatError::Conflict("Record already exists".to_string()),
            StoreError::NotFound => ChatError::NotFound("Record not found".to_string()),
            StoreError::Corrupt(msg) => ChatError::Internal(msg),
            StoreError::Database(e) => ChatError::Internal(e.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A registered account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: OffsetDateTime,
}

/// Public view of an account, safe to return to clients
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&UserRecord> for UserProfile {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// An account waiting to be inserted
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The active chat owned by `owner`, if any
    async fn find_active_chat(&self, owner: &OwnerIdentity) -> StoreResult<Option<Chat>>;

    async fn find_chat(&self, chat_id: Uuid) -> StoreResult<Option<Chat>>;

    /// Insert a new active chat. Fails with [`StoreError::Duplicate`] when the
    /// owner already has one.
    async fn insert_chat(&self, owner: &OwnerIdentity) -> StoreResult<Chat>;

    /// All chats, or only those of `owner`, most recently updated first
    async fn list_chats(&self, owner: Option<&OwnerIdentity>) -> StoreResult<Vec<Chat>>;

    /// Mark a chat closed. Closing an already closed chat is a no-op.
    async fn close_chat(&self, chat_id: Uuid) -> StoreResult<Chat>;

    /// Persist a message and bump the chat's `updated_at`
    async fn append_message(&self, message: NewMessage) -> StoreResult<Message>;

    /// Messages of a chat by timestamp, insertion order on ties
    async fn list_messages(&self, chat_id: Uuid) -> StoreResult<Vec<Message>>;

    /// Insert an account. Fails with [`StoreError::Duplicate`] on a taken
    /// username or email.
    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord>;

    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<UserRecord>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    /// Cheap liveness probe for readiness checks
    async fn ping(&self) -> StoreResult<()>;
}
