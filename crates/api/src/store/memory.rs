//! In-process chat store
//!
//! Keeps everything in `RwLock`-guarded maps. Contents are lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use livechat_shared::{Chat, ChatStatus, Message, NewMessage, OwnerIdentity};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChatStore, NewUser, StoreError, StoreResult, UserRecord};

#[derive(Default)]
struct Inner {
    chats: HashMap<Uuid, Chat>,
    /// Per-chat message log in insertion order
    messages: HashMap<Uuid, Vec<Message>>,
    users: HashMap<Uuid, UserRecord>,
}

impl Inner {
    fn owner_name(&self, owner: &OwnerIdentity) -> Option<String> {
        owner
            .user_id()
            .and_then(|id| self.users.get(&id))
            .map(|u| u.username.clone())
    }

    fn with_owner_name(&self, chat: &Chat) -> Chat {
        Chat {
            owner_name: self.owner_name(&chat.owner),
            ..chat.clone()
        }
    }
}

#[derive(Default)]
pub struct MemoryChatStore {
    inner: RwLock<Inner>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn find_active_chat(&self, owner: &OwnerIdentity) -> StoreResult<Option<Chat>> {
        let inner = self.inner.read().await;
        Ok(inner
            .chats
            .values()
            .find(|c| c.owner == *owner && c.is_active())
            .map(|c| inner.with_owner_name(c)))
    }

    async fn find_chat(&self, chat_id: Uuid) -> StoreResult<Option<Chat>> {
        let inner = self.inner.read().await;
        Ok(inner.chats.get(&chat_id).map(|c| inner.with_owner_name(c)))
    }

    async fn insert_chat(&self, owner: &OwnerIdentity) -> StoreResult<Chat> {
        let mut inner = self.inner.write().await;

        if inner
            .chats
            .values()
            .any(|c| c.owner == *owner && c.is_active())
        {
            return Err(StoreError::Duplicate);
        }

        let now = OffsetDateTime::now_utc();
        let chat = Chat {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            owner_name: inner.owner_name(owner),
            status: ChatStatus::Active,
            created_at: now,
            updated_at: now,
        };
        inner.chats.insert(chat.id, chat.clone());

        Ok(chat)
    }

    async fn list_chats(&self, owner: Option<&OwnerIdentity>) -> StoreResult<Vec<Chat>> {
        let inner = self.inner.read().await;
        let mut chats: Vec<Chat> = inner
            .chats
            .values()
            .filter(|c| owner.map_or(true, |o| c.owner == *o))
            .map(|c| inner.with_owner_name(c))
            .collect();

        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn close_chat(&self, chat_id: Uuid) -> StoreResult<Chat> {
        let mut inner = self.inner.write().await;
        let chat = inner.chats.get_mut(&chat_id).ok_or(StoreError::NotFound)?;

        if chat.is_active() {
            chat.status = ChatStatus::Closed;
            chat.updated_at = OffsetDateTime::now_utc();
        }

        let chat = chat.clone();
        Ok(inner.with_owner_name(&chat))
    }

    async fn append_message(&self, message: NewMessage) -> StoreResult<Message> {
        let mut inner = self.inner.write().await;

        if !inner.chats.contains_key(&message.chat_id) {
            return Err(StoreError::NotFound);
        }

        let log = inner.messages.entry(message.chat_id).or_default();

        // Wall clock can step backwards; keep the log non-decreasing
        let mut timestamp = OffsetDateTime::now_utc();
        if let Some(last) = log.last() {
            timestamp = timestamp.max(last.timestamp);
        }

        let stored = Message {
            id: Uuid::new_v4(),
            chat_id: message.chat_id,
            sender: message.sender,
            author_id: message.author_id,
            display_name: message.display_name,
            content: message.content,
            timestamp,
        };
        log.push(stored.clone());

        if let Some(chat) = inner.chats.get_mut(&stored.chat_id) {
            chat.updated_at = timestamp;
        }

        Ok(stored)
    }

    async fn list_messages(&self, chat_id: Uuid) -> StoreResult<Vec<Message>> {
        let inner = self.inner.read().await;
        let mut messages = inner.messages.get(&chat_id).cloned().unwrap_or_default();
        // Stable sort keeps insertion order on equal timestamps
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut inner = self.inner.write().await;

        let taken = inner.users.values().any(|u| {
            u.username == user.username || u.email.eq_ignore_ascii_case(&user.email)
        });
        if taken {
            return Err(StoreError::Duplicate);
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<UserRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
