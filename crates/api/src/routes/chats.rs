//! Chat routes
//!
//! REST access to chats and their history. Realtime delivery goes through the
//! websocket; admin replies posted here are broadcast to the chat room too.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use livechat_shared::{Chat, Message};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{require_admin, AuthUser},
    chat::Caller,
    error::ApiResult,
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListChatsQuery {
    /// Only chats owned by this user
    pub owner: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub chat: Chat,
    pub display_name: String,
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            display_name: chat.display_name(),
            chat,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List chats visible to the caller, most recently active first
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ListChatsQuery>,
) -> ApiResult<Json<Vec<ChatResponse>>> {
    let caller = Caller::from(&auth_user);
    let chats = state.chats.list_chats(&caller, query.owner).await?;

    Ok(Json(chats.into_iter().map(ChatResponse::from).collect()))
}

/// Resolve-or-create the active chat of a user.
///
/// 201 when a chat was created, 200 when one already existed.
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateChatRequest>,
) -> ApiResult<(StatusCode, Json<ChatResponse>)> {
    let caller = Caller::from(&auth_user);
    let (chat, created) = state.chats.open_chat_for_user(&caller, req.user_id).await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(chat.into())))
}

pub async fn get_chat(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<Json<ChatResponse>> {
    let chat = state
        .chats
        .authorize(chat_id, &Caller::from(&auth_user))
        .await?;

    Ok(Json(chat.into()))
}

/// Full message history, oldest first
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Message>>> {
    let messages = state
        .chats
        .list_messages(&Caller::from(&auth_user), chat_id)
        .await?;

    Ok(Json(messages))
}

/// Admin reply
pub async fn post_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    require_admin(&auth_user)?;

    let message = state
        .chats
        .post_admin_message(&Caller::from(&auth_user), chat_id, &req.content)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Admin closes a chat
pub async fn close_chat(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<Json<ChatResponse>> {
    require_admin(&auth_user)?;

    let chat = state
        .chats
        .close_chat(&Caller::from(&auth_user), chat_id)
        .await?;

    Ok(Json(chat.into()))
}
