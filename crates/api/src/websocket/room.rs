//! Chat room management for pub/sub
//!
//! Manages chat "rooms" for broadcasting events to all subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;

/// Manages chat "rooms" for broadcasting events
pub struct RoomManager {
    /// Map of chat_id -> list of connections
    rooms: Arc<RwLock<HashMap<Uuid, Vec<Arc<Connection>>>>>,
}

impl RoomManager {
    /// Create a new room manager
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a connection to a chat room.
    ///
    /// Returns `false` when the connection was already a member.
    pub async fn join(&self, chat_id: Uuid, conn: Arc<Connection>) -> bool {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(chat_id).or_default();

        if members.iter().any(|c| c.session_id == conn.session_id) {
            return false;
        }
        members.push(Arc::clone(&conn));
        let count = members.len();
        drop(rooms);

        conn.subscribe(chat_id).await;
        tracing::debug!(
            chat_id = %chat_id,
            session_id = %conn.session_id,
            room_size = count,
            "Connection joined chat room"
        );
        true
    }

    /// Remove a connection from a chat room
    pub async fn leave(&self, chat_id: &Uuid, conn: &Connection) {
        let mut rooms = self.rooms.write().await;
        if let Some(conns) = rooms.get_mut(chat_id) {
            conns.retain(|c| c.session_id != conn.session_id);

            // Clean up empty rooms
            if conns.is_empty() {
                rooms.remove(chat_id);
                tracing::debug!(chat_id = %chat_id, "Removed empty chat room");
            } else {
                tracing::debug!(
                    chat_id = %chat_id,
                    session_id = %conn.session_id,
                    room_size = conns.len(),
                    "Connection left chat room"
                );
            }
        }
        drop(rooms);

        conn.unsubscribe(*chat_id).await;
    }

    /// Broadcast an event to all connections in a chat room.
    ///
    /// Returns the number of connections the event was handed to. Send errors
    /// are ignored; closed connections are cleaned up on disconnect.
    pub async fn broadcast(&self, chat_id: &Uuid, event: ServerEvent) -> usize {
        let rooms = self.rooms.read().await;
        let Some(conns) = rooms.get(chat_id) else {
            tracing::debug!(
                chat_id = %chat_id,
                event_type = event.kind(),
                "No subscribers in chat room"
            );
            return 0;
        };

        let mut success_count = 0;
        let mut failed_count = 0;

        for conn in conns {
            match conn.send(event.clone()) {
                Ok(()) => success_count += 1,
                Err(_) => {
                    failed_count += 1;
                    tracing::warn!(
                        session_id = %conn.session_id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(
            chat_id = %chat_id,
            event_type = event.kind(),
            recipients = success_count,
            failed = failed_count,
            "Broadcast event to chat room"
        );

        success_count
    }

    /// Remove a connection from all rooms
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        let mut removed_from = 0;

        for conns in rooms.values_mut() {
            let before_len = conns.len();
            conns.retain(|c| c.session_id != *session_id);
            if conns.len() < before_len {
                removed_from += 1;
            }
        }

        // Clean up empty rooms
        rooms.retain(|_, conns| !conns.is_empty());

        if removed_from > 0 {
            tracing::debug!(
                session_id = %session_id,
                chat_count = removed_from,
                "Removed connection from rooms"
            );
        }
    }

    /// Get room size (number of connections) for a chat
    pub async fn get_room_size(&self, chat_id: &Uuid) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(chat_id).map(|v| v.len()).unwrap_or(0)
    }

    /// Get total number of active rooms
    pub async fn get_room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
