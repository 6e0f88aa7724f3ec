//! WebSocket handler for Axum
//!
//! Handles WebSocket connections, handshake identity, and event routing.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use livechat_shared::{ChatError, OwnerIdentity};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::chat::{Caller, ChatService};
use crate::state::AppState;

use super::{
    connection::Connection,
    events::{ClientEvent, ServerEvent},
};

/// Handshake parameters. A `token` wins over an `anonymous_token`; with
/// neither, the server issues a new anonymous token.
#[derive(Debug, Default, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
    anonymous_token: Option<String>,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
/// Authenticates via query parameter instead of middleware Extension
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
) -> Result<Response, StatusCode> {
    let (caller, issued_token) = resolve_caller(&app_state, params).await?;

    tracing::info!(caller = %caller.identity, "WebSocket connection upgrade requested");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, caller, issued_token, app_state)))
}

/// Turn handshake parameters into a caller, plus the anonymous token when
/// the server had to mint one
async fn resolve_caller(
    app_state: &AppState,
    params: WebSocketQuery,
) -> Result<(Caller, Option<String>), StatusCode> {
    if let Some(token) = params.token {
        let auth_user = app_state
            .auth_state()
            .verify_bearer(&token)
            .await
            .map_err(|e| {
                tracing::warn!(error = ?e, "WebSocket auth failed: invalid token");
                StatusCode::UNAUTHORIZED
            })?;
        return Ok((Caller::from(&auth_user), None));
    }

    if let Some(token) = params.anonymous_token {
        let identity = OwnerIdentity::anonymous(token).map_err(|e| {
            tracing::warn!(error = %e, "WebSocket handshake rejected: bad anonymous token");
            StatusCode::BAD_REQUEST
        })?;
        return Ok((Caller::anonymous(identity.key()), None));
    }

    let token = OwnerIdentity::new_anonymous_token();
    Ok((Caller::anonymous(token.clone()), Some(token)))
}

/// Handle individual WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    caller: Caller,
    issued_token: Option<String>,
    app_state: AppState,
) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn = open_session(&app_state, caller, issued_token, tx).await;
    let session_id = conn.session_id;

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        let Ok(msg) = msg else { break };
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    handle_client_event(event, Arc::clone(&conn), &app_state.chats).await;
                }
                Err(e) => {
                    tracing::warn!(
                        error = ?e,
                        session_id = %session_id,
                        "Failed to parse client event"
                    );
                    let _ = conn.send(ServerEvent::Error {
                        code: "BAD_REQUEST".to_string(),
                        message: "Invalid event format".to_string(),
                    });
                }
            },
            Message::Close(_) => {
                tracing::info!(session_id = %session_id, "WebSocket close frame received");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Axum handles ping/pong automatically
            }
            Message::Binary(_) => {}
        }
    }

    // Cleanup on disconnect
    tracing::info!(session_id = %session_id, "WebSocket connection closing");
    app_state.sessions.disconnect(&session_id).await;

    send_task.abort();
}

/// Register the session and acknowledge the handshake. A server-issued
/// anonymous token is handed back in `connected`.
async fn open_session(
    app_state: &AppState,
    caller: Caller,
    issued_token: Option<String>,
    tx: mpsc::UnboundedSender<ServerEvent>,
) -> Arc<Connection> {
    let conn = app_state.sessions.register(Connection::new(caller, tx)).await;

    let _ = conn.send(ServerEvent::Connected {
        session_id: conn.session_id,
        anonymous_token: issued_token,
    });

    conn
}

/// Handle client event
pub(crate) async fn handle_client_event(
    event: ClientEvent,
    conn: Arc<Connection>,
    chats: &ChatService,
) {
    match event {
        ClientEvent::JoinChat { chat_id } => {
            if let Err(e) = join_chat(&conn, chats, chat_id).await {
                let _ = conn.send(ServerEvent::error(&e));
            }
        }

        ClientEvent::LeaveChat { chat_id } => {
            chats.rooms().leave(&chat_id, &conn).await;
        }

        ClientEvent::SendMessage {
            chat_id,
            content,
            client_ref,
        } => {
            if let Err(e) = send_message(&conn, chats, chat_id, &content).await {
                tracing::warn!(
                    session_id = %conn.session_id,
                    code = e.code(),
                    error = %e,
                    "Send rejected"
                );
                let _ = conn.send(ServerEvent::send_failed(client_ref, &e));
            }
        }

        ClientEvent::ListMessages { chat_id } => {
            match chats.list_messages(&conn.caller, chat_id).await {
                Ok(messages) => {
                    let _ = conn.send(ServerEvent::History { chat_id, messages });
                }
                Err(e) => {
                    let _ = conn.send(ServerEvent::error(&e));
                }
            }
        }

        ClientEvent::Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}

/// Authorize and subscribe; announces `joined` only on first join
async fn join_chat(
    conn: &Arc<Connection>,
    chats: &ChatService,
    chat_id: Uuid,
) -> Result<(), ChatError> {
    chats.authorize(chat_id, &conn.caller).await?;
    if chats.rooms().join(chat_id, Arc::clone(conn)).await {
        let _ = conn.send(ServerEvent::Joined { chat_id });
    }
    Ok(())
}

/// Store and broadcast a message. The sending connection is joined to the
/// chat first so it receives its own confirmation.
async fn send_message(
    conn: &Arc<Connection>,
    chats: &ChatService,
    chat_id: Option<Uuid>,
    content: &str,
) -> Result<(), ChatError> {
    let caller = &conn.caller;
    chats.validate_content(content)?;

    let chat = if caller.is_admin {
        let chat_id = chat_id.ok_or_else(|| {
            ChatError::Validation("chat_id is required for admin replies".to_string())
        })?;
        chats.authorize(chat_id, caller).await?
    } else {
        // Owners always write to their own active chat
        chats.resolve(&caller.identity).await?.0
    };

    join_chat(conn, chats, chat.id).await?;
    chats.post_message(caller, &chat, content).await?;
    Ok(())
}
