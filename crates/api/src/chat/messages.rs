//! Message posting, history and chat closing
//!
//! Every stored message is broadcast to its chat room exactly once, after the
//! store has accepted it. Within a chat, broadcasts go out in the order the
//! store accepted the messages.

use livechat_shared::{normalize_content, Chat, ChatError, ChatResult, Message, NewMessage};
use uuid::Uuid;

use super::{Caller, ChatService};
use crate::websocket::events::ServerEvent;

impl ChatService {
    /// Trim content and enforce the configured length limit
    pub fn validate_content(&self, content: &str) -> ChatResult<String> {
        normalize_content(content, self.max_message_length)
    }

    /// Store a message in an active chat the caller may write to, then
    /// broadcast it to the chat's room.
    pub async fn post_message(
        &self,
        caller: &Caller,
        chat: &Chat,
        content: &str,
    ) -> ChatResult<Message> {
        let content = self.validate_content(content)?;

        if !caller.can_access(&chat.owner) {
            return Err(ChatError::Forbidden(format!("Chat {}", chat.id)));
        }
        if !chat.is_active() {
            return Err(ChatError::Validation("Chat is closed".to_string()));
        }

        let lock = self.chat_lock(chat.id).await;
        let _guard = lock.lock().await;

        let message = self
            .store
            .append_message(NewMessage {
                chat_id: chat.id,
                sender: caller.sender(),
                author_id: caller.identity.user_id(),
                display_name: caller.display_name.clone(),
                content,
            })
            .await?;

        tracing::info!(
            chat_id = %chat.id,
            message_id = %message.id,
            sender = %message.sender,
            "Message stored"
        );

        self.rooms
            .broadcast(
                &chat.id,
                ServerEvent::NewMessage {
                    chat_id: chat.id,
                    message: message.clone(),
                },
            )
            .await;

        Ok(message)
    }

    /// Post into the caller's own active chat, creating it on first send
    pub async fn send_as_owner(
        &self,
        caller: &Caller,
        content: &str,
    ) -> ChatResult<(Chat, Message)> {
        // Reject bad input before a chat gets created for it
        self.validate_content(content)?;

        let (chat, _) = self.resolve(&caller.identity).await?;
        let message = self.post_message(caller, &chat, content).await?;
        Ok((chat, message))
    }

    /// Admin reply into an existing chat
    pub async fn post_admin_message(
        &self,
        caller: &Caller,
        chat_id: Uuid,
        content: &str,
    ) -> ChatResult<Message> {
        if !caller.is_admin {
            return Err(ChatError::Forbidden("Admin access required".to_string()));
        }

        let chat = self.authorize(chat_id, caller).await?;
        self.post_message(caller, &chat, content).await
    }

    /// Full history of a chat, oldest first
    pub async fn list_messages(&self, caller: &Caller, chat_id: Uuid) -> ChatResult<Vec<Message>> {
        self.authorize(chat_id, caller).await?;
        Ok(self.store.list_messages(chat_id).await?)
    }

    /// Close a chat and tell its room. The owner's next send opens a new one.
    pub async fn close_chat(&self, caller: &Caller, chat_id: Uuid) -> ChatResult<Chat> {
        if !caller.is_admin {
            return Err(ChatError::Forbidden("Admin access required".to_string()));
        }

        let chat = self.authorize(chat_id, caller).await?;
        if !chat.is_active() {
            return Ok(chat);
        }

        let lock = self.chat_lock(chat_id).await;
        let guard = lock.lock().await;

        let chat = self.store.close_chat(chat_id).await?;
        tracing::info!(chat_id = %chat_id, "Chat closed");

        self.rooms
            .broadcast(&chat_id, ServerEvent::ChatClosed { chat_id })
            .await;

        drop(guard);
        self.release_chat_lock(&chat_id).await;

        Ok(chat)
    }
}
