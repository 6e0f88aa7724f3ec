//! Chat identity resolution and access checks

use livechat_shared::{Chat, ChatError, ChatResult, OwnerIdentity};
use uuid::Uuid;

use super::{Caller, ChatService};
use crate::store::StoreError;

impl ChatService {
    /// The active chat of `owner`, created if absent.
    ///
    /// Returns `(chat, created)`. Concurrent callers for the same owner all
    /// end up with the same chat: the losing insert hits the unique index and
    /// re-reads the winner's row.
    pub async fn resolve(&self, owner: &OwnerIdentity) -> ChatResult<(Chat, bool)> {
        if let Some(chat) = self.store.find_active_chat(owner).await? {
            return Ok((chat, false));
        }

        match self.store.insert_chat(owner).await {
            Ok(chat) => {
                tracing::info!(chat_id = %chat.id, owner = %owner, "Chat created");
                Ok((chat, true))
            }
            Err(StoreError::Duplicate) => {
                tracing::debug!(owner = %owner, "Lost chat creation race, re-fetching");
                let chat = self.store.find_active_chat(owner).await?.ok_or_else(|| {
                    ChatError::Internal(format!(
                        "Active chat for {} vanished after conflict",
                        owner
                    ))
                })?;
                Ok((chat, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load a chat the caller is allowed to see
    pub async fn authorize(&self, chat_id: Uuid, caller: &Caller) -> ChatResult<Chat> {
        let chat = self
            .store
            .find_chat(chat_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("Chat {}", chat_id)))?;

        if !caller.can_access(&chat.owner) {
            tracing::warn!(
                chat_id = %chat_id,
                caller = %caller.identity,
                "Chat access denied"
            );
            return Err(ChatError::Forbidden(format!("Chat {}", chat_id)));
        }

        Ok(chat)
    }

    /// Chats visible to the caller, most recently updated first.
    ///
    /// Admins see every chat, optionally narrowed to one user. Everyone else
    /// sees only their own and may not ask for another user's.
    pub async fn list_chats(&self, caller: &Caller, owner: Option<Uuid>) -> ChatResult<Vec<Chat>> {
        let filter = match owner {
            Some(user_id) => Some(OwnerIdentity::Authenticated(user_id)),
            None if caller.is_admin => None,
            None => Some(caller.identity.clone()),
        };

        if let Some(ref requested) = filter {
            if !caller.can_access(requested) {
                return Err(ChatError::Forbidden(
                    "Cannot list another user's chats".to_string(),
                ));
            }
        }

        Ok(self.store.list_chats(filter.as_ref()).await?)
    }

    /// Resolve-or-create the chat of a registered user on the caller's behalf
    pub async fn open_chat_for_user(
        &self,
        caller: &Caller,
        user_id: Uuid,
    ) -> ChatResult<(Chat, bool)> {
        let owner = OwnerIdentity::Authenticated(user_id);
        if !caller.can_access(&owner) {
            return Err(ChatError::Forbidden(
                "Cannot open a chat for another user".to_string(),
            ));
        }

        if self.store.find_user(user_id).await?.is_none() {
            return Err(ChatError::NotFound(format!("User {}", user_id)));
        }

        self.resolve(&owner).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use livechat_shared::{Message, NewMessage, UserRole};

    use super::*;
    use crate::store::{ChatStore, MemoryChatStore, NewUser, StoreResult, UserRecord};
    use crate::websocket::room::RoomManager;

    fn service(store: Arc<dyn ChatStore>) -> ChatService {
        ChatService::new(store, Arc::new(RoomManager::new()), 5000)
    }

    fn admin() -> Caller {
        Caller {
            identity: OwnerIdentity::Authenticated(Uuid::new_v4()),
            display_name: "support".to_string(),
            is_admin: true,
        }
    }

    async fn register(store: &MemoryChatStore, username: &str) -> UserRecord {
        store
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: "hash".to_string(),
                role: UserRole::User,
            })
            .await
            .unwrap()
    }

    /// Hides the first lookup so the caller races into a duplicate insert
    struct RacingStore {
        inner: MemoryChatStore,
        hid_once: AtomicBool,
    }

    #[async_trait]
    impl ChatStore for RacingStore {
        async fn find_active_chat(&self, owner: &OwnerIdentity) -> StoreResult<Option<Chat>> {
            if !self.hid_once.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_active_chat(owner).await
        }
        async fn find_chat(&self, chat_id: Uuid) -> StoreResult<Option<Chat>> {
            self.inner.find_chat(chat_id).await
        }
        async fn insert_chat(&self, owner: &OwnerIdentity) -> StoreResult<Chat> {
            self.inner.insert_chat(owner).await
        }
        async fn list_chats(&self, owner: Option<&OwnerIdentity>) -> StoreResult<Vec<Chat>> {
            self.inner.list_chats(owner).await
        }
        async fn close_chat(&self, chat_id: Uuid) -> StoreResult<Chat> {
            self.inner.close_chat(chat_id).await
        }
        async fn append_message(&self, message: NewMessage) -> StoreResult<Message> {
            self.inner.append_message(message).await
        }
        async fn list_messages(&self, chat_id: Uuid) -> StoreResult<Vec<Message>> {
            self.inner.list_messages(chat_id).await
        }
        async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord> {
            self.inner.insert_user(user).await
        }
        async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<UserRecord>> {
            self.inner.find_user(user_id).await
        }
        async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
            self.inner.find_user_by_email(email).await
        }
        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_resolve_creates_then_reuses() {
        let chats = service(Arc::new(MemoryChatStore::new()));
        let owner = OwnerIdentity::anonymous("anon_resolve_test").unwrap();

        let (first, created) = chats.resolve(&owner).await.unwrap();
        assert!(created);
        let (second, created) = chats.resolve(&owner).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_concurrent_resolve_yields_one_chat() {
        let store = Arc::new(MemoryChatStore::new());
        let chats = service(store.clone());
        let owner = OwnerIdentity::anonymous("anon_concurrent_test").unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let chats = chats.clone();
                let owner = owner.clone();
                tokio::spawn(async move { chats.resolve(&owner).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            let (chat, _) = handle.await.unwrap().unwrap();
            ids.push(chat.id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.list_chats(Some(&owner)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_recovered_by_refetch() {
        let inner = MemoryChatStore::new();
        let owner = OwnerIdentity::anonymous("anon_race_loser").unwrap();
        let existing = inner.insert_chat(&owner).await.unwrap();

        let chats = service(Arc::new(RacingStore {
            inner,
            hid_once: AtomicBool::new(false),
        }));

        let (chat, created) = chats.resolve(&owner).await.unwrap();
        assert!(!created);
        assert_eq!(chat.id, existing.id);
    }

    #[tokio::test]
    async fn test_authorize() {
        let store = Arc::new(MemoryChatStore::new());
        let chats = service(store.clone());
        let owner = Caller::anonymous("anon_owner_session");
        let stranger = Caller::anonymous("anon_other_session");

        let (chat, _) = chats.resolve(&owner.identity).await.unwrap();

        assert!(chats.authorize(chat.id, &owner).await.is_ok());
        assert!(chats.authorize(chat.id, &admin()).await.is_ok());
        assert!(matches!(
            chats.authorize(chat.id, &stranger).await,
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            chats.authorize(Uuid::new_v4(), &owner).await,
            Err(ChatError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_chats_scoping() {
        let store = Arc::new(MemoryChatStore::new());
        let chats = service(store.clone());
        let alice = register(&store, "alice").await;
        let bob = register(&store, "bob").await;

        let alice_caller = Caller {
            identity: OwnerIdentity::Authenticated(alice.id),
            display_name: "alice".to_string(),
            is_admin: false,
        };

        chats.resolve(&OwnerIdentity::Authenticated(alice.id)).await.unwrap();
        chats.resolve(&OwnerIdentity::Authenticated(bob.id)).await.unwrap();

        assert_eq!(chats.list_chats(&admin(), None).await.unwrap().len(), 2);
        assert_eq!(chats.list_chats(&admin(), Some(bob.id)).await.unwrap().len(), 1);

        let own = chats.list_chats(&alice_caller, None).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].owner_name.as_deref(), Some("alice"));

        assert!(matches!(
            chats.list_chats(&alice_caller, Some(bob.id)).await,
            Err(ChatError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_open_chat_for_user() {
        let store = Arc::new(MemoryChatStore::new());
        let chats = service(store.clone());
        let alice = register(&store, "alice").await;
        let alice_caller = Caller {
            identity: OwnerIdentity::Authenticated(alice.id),
            display_name: "alice".to_string(),
            is_admin: false,
        };

        let (chat, created) = chats.open_chat_for_user(&alice_caller, alice.id).await.unwrap();
        assert!(created);
        let (again, created) = chats.open_chat_for_user(&admin(), alice.id).await.unwrap();
        assert!(!created);
        assert_eq!(chat.id, again.id);

        assert!(matches!(
            chats.open_chat_for_user(&alice_caller, Uuid::new_v4()).await,
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            chats.open_chat_for_user(&admin(), Uuid::new_v4()).await,
            Err(ChatError::NotFound(_))
        ));
    }
}
