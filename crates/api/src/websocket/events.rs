//! WebSocket event types and serialization
//!
//! Defines all client-to-server and server-to-client event types
//! with type-safe serde serialization.

use livechat_shared::{ChatError, Message};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Subscribe to a chat room
    JoinChat { chat_id: Uuid },

    /// Unsubscribe from a chat room
    LeaveChat { chat_id: Uuid },

    /// Post a message. Users and anonymous visitors write to their own chat;
    /// admins must name the chat they reply to.
    SendMessage {
        #[serde(default)]
        chat_id: Option<Uuid>,
        content: String,
        /// Opaque client handle echoed back in `send_failed`, e.g. a provisional id
        #[serde(default)]
        client_ref: Option<String>,
    },

    /// Request the full history of a chat
    ListMessages { chat_id: Uuid },

    /// Heartbeat ping to keep connection alive
    Ping,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Connection acknowledged
    Connected {
        session_id: Uuid,
        /// Freshly issued anonymous token; the widget keeps it for reconnects
        #[serde(skip_serializing_if = "Option::is_none")]
        anonymous_token: Option<String>,
    },

    /// Connection now receives broadcasts for this chat
    Joined { chat_id: Uuid },

    /// New message stored in a chat
    NewMessage { chat_id: Uuid, message: Message },

    /// Full message history of a chat, oldest first
    History { chat_id: Uuid, messages: Vec<Message> },

    /// Chat was closed by an admin
    ChatClosed { chat_id: Uuid },

    /// A `send_message` was rejected; nothing was stored
    SendFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
        code: String,
        message: String,
    },

    /// Heartbeat response
    Pong,

    /// Error message
    Error { code: String, message: String },
}

/// Text shown to the client; internal details stay in the logs
fn client_message(err: &ChatError) -> String {
    match err {
        ChatError::Internal(_) => "Internal server error".to_string(),
        _ => err.to_string(),
    }
}

impl ServerEvent {
    pub fn error(err: &ChatError) -> Self {
        ServerEvent::Error {
            code: err.code().to_string(),
            message: client_message(err),
        }
    }

    pub fn send_failed(client_ref: Option<String>, err: &ChatError) -> Self {
        ServerEvent::SendFailed {
            client_ref,
            code: err.code().to_string(),
            message: client_message(err),
        }
    }

    /// Event tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::Joined { .. } => "joined",
            ServerEvent::NewMessage { .. } => "new_message",
            ServerEvent::History { .. } => "history",
            ServerEvent::ChatClosed { .. } => "chat_closed",
            ServerEvent::SendFailed { .. } => "send_failed",
            ServerEvent::Pong => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_deserialization() {
        let json = r#"{"type":"join_chat","chat_id":"550e8400-e29b-41d4-a716-446655440000"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::JoinChat { chat_id } => {
                assert_eq!(chat_id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
            }
            _ => panic!("Expected JoinChat event"),
        }
    }

    #[test]
    fn test_send_message_optional_fields() {
        let json = r#"{"type":"send_message","content":"hello"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::SendMessage {
                chat_id,
                content,
                client_ref,
            } => {
                assert!(chat_id.is_none());
                assert!(client_ref.is_none());
                assert_eq!(content, "hello");
            }
            _ => panic!("Expected SendMessage event"),
        }
    }

    #[test]
    fn test_server_event_serialization() {
        let event = ServerEvent::Pong;
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_send_failed_carries_code_and_ref() {
        let err = ChatError::Validation("Message content cannot be empty".to_string());
        let event = ServerEvent::send_failed(Some("temp_3".to_string()), &err);
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "send_failed");
        assert_eq!(json["client_ref"], "temp_3");
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_internal_details_not_sent_to_client() {
        let event = ServerEvent::error(&ChatError::Internal("pool timed out".to_string()));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("INTERNAL_ERROR"));
        assert!(!json.contains("pool timed out"));
    }

    #[test]
    fn test_connected_omits_missing_token() {
        let event = ServerEvent::Connected {
            session_id: Uuid::nil(),
            anonymous_token: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("anonymous_token"));
    }
}
