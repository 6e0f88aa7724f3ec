//! Chat domain types shared by the server and clients

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ChatError;

/// Display name stamped on messages from senders without an account
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous";

/// Prefix for server-issued anonymous session tokens
pub const ANONYMOUS_TOKEN_PREFIX: &str = "anon_";

const ANONYMOUS_TOKEN_MIN_LEN: usize = 8;
const ANONYMOUS_TOKEN_MAX_LEN: usize = 128;

// =============================================================================
// Owner Identity
// =============================================================================

/// Who owns a chat: a registered user or an anonymous widget session.
///
/// Resolved once where a request enters the system; everything downstream
/// matches on the variant instead of guessing from the shape of an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerIdentity {
    Authenticated(Uuid),
    Anonymous(String),
}

impl OwnerIdentity {
    /// Build an anonymous identity from a client-supplied session token
    pub fn anonymous(token: impl Into<String>) -> Result<Self, ChatError> {
        let token = token.into();
        validate_anonymous_token(&token)?;
        Ok(Self::Anonymous(token))
    }

    /// Generate a fresh anonymous session token
    pub fn new_anonymous_token() -> String {
        format!("{}{}", ANONYMOUS_TOKEN_PREFIX, Uuid::new_v4().simple())
    }

    /// Storage discriminator (`owner_kind` column)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticated(_) => "user",
            Self::Anonymous(_) => "anonymous",
        }
    }

    /// Storage key (`owner_key` column)
    pub fn key(&self) -> String {
        match self {
            Self::Authenticated(id) => id.to_string(),
            Self::Anonymous(token) => token.clone(),
        }
    }

    /// Rebuild an identity from its stored `(owner_kind, owner_key)` pair
    pub fn from_parts(kind: &str, key: &str) -> Result<Self, ChatError> {
        match kind {
            "user" => Uuid::parse_str(key)
                .map(Self::Authenticated)
                .map_err(|e| ChatError::Internal(format!("Invalid owner user id {}: {}", key, e))),
            "anonymous" => Ok(Self::Anonymous(key.to_string())),
            other => Err(ChatError::Internal(format!("Unknown owner kind: {}", other))),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Authenticated(id) => Some(*id),
            Self::Anonymous(_) => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous(_))
    }
}

impl std::fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}

fn validate_anonymous_token(token: &str) -> Result<(), ChatError> {
    if token.len() < ANONYMOUS_TOKEN_MIN_LEN || token.len() > ANONYMOUS_TOKEN_MAX_LEN {
        return Err(ChatError::Validation(format!(
            "Anonymous token must be {}-{} characters",
            ANONYMOUS_TOKEN_MIN_LEN, ANONYMOUS_TOKEN_MAX_LEN
        )));
    }
    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ChatError::Validation(
            "Anonymous token may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Enums
// =============================================================================

/// Chat lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Active,
    Closed,
}

impl Default for ChatStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl std::fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Which side of the conversation wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Admin,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Platform role of a registered account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::User
    }
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// The sender tag this role writes messages as
    pub fn sender(&self) -> Sender {
        match self {
            Self::User => Sender::User,
            Self::Admin => Sender::Admin,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

// =============================================================================
// Entities
// =============================================================================

/// A support conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub owner: OwnerIdentity,
    /// Owner's username, when the owner is a registered user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    pub status: ChatStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Chat {
    pub fn is_active(&self) -> bool {
        self.status == ChatStatus::Active
    }

    /// Name to show for this chat in an admin listing
    pub fn display_name(&self) -> String {
        match (&self.owner_name, &self.owner) {
            (Some(name), _) => name.clone(),
            (None, OwnerIdentity::Anonymous(_)) => ANONYMOUS_DISPLAY_NAME.to_string(),
            (None, OwnerIdentity::Authenticated(id)) => id.to_string(),
        }
    }
}

/// A stored chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<Uuid>,
    /// Author's name at the time of sending
    pub display_name: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// A message waiting to be appended; the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub sender: Sender,
    pub author_id: Option<Uuid>,
    pub display_name: String,
    pub content: String,
}

/// Trim message content and enforce non-empty / maximum length
pub fn normalize_content(content: &str, max_len: usize) -> Result<String, ChatError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation(
            "Message content cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > max_len {
        return Err(ChatError::Validation(format!(
            "Message too long (max {} characters)",
            max_len
        )));
    }
    Ok(trimmed.to_string())
}
