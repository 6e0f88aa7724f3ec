//! Chat services: identity resolution, message posting and room fan-out
//!
//! [`ChatService`] is shared by the REST routes and the websocket handler so
//! both surfaces store and broadcast messages the same way.

mod identity;
mod messages;

use std::collections::HashMap;
use std::sync::Arc;

use livechat_shared::{OwnerIdentity, Sender, ANONYMOUS_DISPLAY_NAME};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::store::ChatStore;
use crate::websocket::room::RoomManager;

/// The party making a request, resolved once at the boundary
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: OwnerIdentity,
    /// Name stamped on messages this caller writes
    pub display_name: String,
    pub is_admin: bool,
}

impl Caller {
    /// An anonymous widget session. The token must already be validated.
    pub fn anonymous(token: impl Into<String>) -> Self {
        Self {
            identity: OwnerIdentity::Anonymous(token.into()),
            display_name: ANONYMOUS_DISPLAY_NAME.to_string(),
            is_admin: false,
        }
    }

    pub fn sender(&self) -> Sender {
        if self.is_admin {
            Sender::Admin
        } else {
            Sender::User
        }
    }

    /// Whether the caller may read and write this owner's chat
    pub fn can_access(&self, owner: &OwnerIdentity) -> bool {
        self.is_admin || self.identity == *owner
    }
}

impl From<&AuthUser> for Caller {
    fn from(user: &AuthUser) -> Self {
        Self {
            identity: OwnerIdentity::Authenticated(user.user_id),
            display_name: user.username.clone(),
            is_admin: user.is_admin(),
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    rooms: Arc<RoomManager>,
    /// Held across append and broadcast so a room sees messages in
    /// stored order
    chat_locks: Arc<RwLock<HashMap<Uuid, Arc<Mutex<()>>>>>,
    max_message_length: usize,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        rooms: Arc<RoomManager>,
        max_message_length: usize,
    ) -> Self {
        Self {
            store,
            rooms,
            chat_locks: Arc::new(RwLock::new(HashMap::new())),
            max_message_length,
        }
    }

    pub fn rooms(&self) -> &Arc<RoomManager> {
        &self.rooms
    }

    async fn chat_lock(&self, chat_id: Uuid) -> Arc<Mutex<()>> {
        if let Some(lock) = self.chat_locks.read().await.get(&chat_id) {
            return Arc::clone(lock);
        }

        let mut locks = self.chat_locks.write().await;
        Arc::clone(locks.entry(chat_id).or_default())
    }

    async fn release_chat_lock(&self, chat_id: &Uuid) {
        self.chat_locks.write().await.remove(chat_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livechat_shared::UserRole;

    #[test]
    fn test_caller_from_auth_user() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            username: "support".to_string(),
            email: "support@example.com".to_string(),
            role: UserRole::Admin,
        };
        let caller = Caller::from(&user);

        assert_eq!(caller.identity, OwnerIdentity::Authenticated(user.user_id));
        assert_eq!(caller.display_name, "support");
        assert_eq!(caller.sender(), Sender::Admin);
    }

    #[test]
    fn test_anonymous_caller_only_accesses_own_chat() {
        let caller = Caller::anonymous("anon_widget_one");
        assert_eq!(caller.sender(), Sender::User);
        assert_eq!(caller.display_name, ANONYMOUS_DISPLAY_NAME);
        assert!(caller.can_access(&OwnerIdentity::Anonymous("anon_widget_one".to_string())));
        assert!(!caller.can_access(&OwnerIdentity::Anonymous("anon_widget_two".to_string())));
    }
}
