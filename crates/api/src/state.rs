//! Shared application state

use std::sync::Arc;

use crate::{
    auth::{AuthState, JwtManager},
    chat::ChatService,
    config::Config,
    store::ChatStore,
    websocket::{room::RoomManager, SessionRegistry},
};

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ChatStore>,
    pub sessions: SessionRegistry,
    pub chats: ChatService,
    pub jwt_manager: Arc<JwtManager>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ChatStore>) -> Self {
        let rooms = Arc::new(RoomManager::new());
        let sessions = SessionRegistry::new(Arc::clone(&rooms));
        let chats = ChatService::new(Arc::clone(&store), rooms, config.max_message_length);
        let jwt_manager = Arc::new(JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours));

        Self {
            config: Arc::new(config),
            store,
            sessions,
            chats,
            jwt_manager,
        }
    }

    /// State for the auth middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: Arc::clone(&self.jwt_manager),
            store: Arc::clone(&self.store),
        }
    }
}
