//! Live session registry
//!
//! Tracks every open websocket session so the desk can report how many
//! support agents and visitors are online. Ending a session also drops it
//! from every chat room.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::room::RoomManager;

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,
    rooms: Arc<RoomManager>,
}

impl SessionRegistry {
    pub fn new(rooms: Arc<RoomManager>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            rooms,
        }
    }

    /// Start tracking a handshaken connection
    pub async fn register(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut sessions = self.sessions.write().await;
        sessions.insert(conn.session_id, Arc::clone(&conn));

        tracing::info!(
            session_id = %conn.session_id,
            caller = %conn.caller.identity,
            admin = conn.caller.is_admin,
            open_sessions = sessions.len(),
            "Session opened"
        );

        conn
    }

    /// Forget a session and leave all of its rooms
    pub async fn disconnect(&self, session_id: &Uuid) {
        let removed = self.sessions.write().await.remove(session_id);
        let Some(conn) = removed else {
            return;
        };

        self.rooms.remove_connection(session_id).await;
        tracing::info!(
            session_id = %session_id,
            caller = %conn.caller.identity,
            "Session closed"
        );
    }

    pub async fn stats(&self) -> DeskStats {
        let sessions = self.sessions.read().await;
        let admins_online = sessions.values().filter(|c| c.caller.is_admin).count();

        DeskStats {
            active_sessions: sessions.len(),
            admins_online,
            visitors_online: sessions.len() - admins_online,
            active_rooms: self.rooms.get_room_count().await,
        }
    }
}

/// Who is online, as reported by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct DeskStats {
    pub active_sessions: usize,
    pub admins_online: usize,
    pub visitors_online: usize,
    /// Chats with at least one subscribed session
    pub active_rooms: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Caller;
    use livechat_shared::OwnerIdentity;
    use tokio::sync::mpsc;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(RoomManager::new()))
    }

    fn session(caller: Caller) -> Connection {
        let (tx, _rx) = mpsc::unbounded_channel();
        Connection::new(caller, tx)
    }

    #[tokio::test]
    async fn test_disconnect_leaves_every_room() {
        let registry = registry();
        let conn = registry
            .register(session(Caller::anonymous("anon_session_test")))
            .await;

        registry.rooms.join(Uuid::new_v4(), Arc::clone(&conn)).await;
        registry.rooms.join(Uuid::new_v4(), Arc::clone(&conn)).await;
        assert_eq!(registry.stats().await.active_rooms, 2);

        registry.disconnect(&conn.session_id).await;
        let stats = registry.stats().await;
        assert_eq!(stats.active_sessions, 0);
        assert_eq!(stats.active_rooms, 0);

        // Unknown sessions are ignored
        registry.disconnect(&conn.session_id).await;
    }

    #[tokio::test]
    async fn test_stats_split_admins_and_visitors() {
        let registry = registry();
        let admin = Caller {
            identity: OwnerIdentity::Authenticated(Uuid::new_v4()),
            display_name: "support".to_string(),
            is_admin: true,
        };

        registry.register(session(admin)).await;
        registry.register(session(Caller::anonymous("anon_visitor_a"))).await;
        registry.register(session(Caller::anonymous("anon_visitor_b"))).await;

        let stats = registry.stats().await;
        assert_eq!(stats.active_sessions, 3);
        assert_eq!(stats.admins_online, 1);
        assert_eq!(stats.visitors_online, 2);
        assert_eq!(stats.active_rooms, 0);
    }
}
