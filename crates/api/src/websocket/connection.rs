//! WebSocket connection management
//!
//! Represents an active WebSocket connection with room subscription tracking.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::events::ServerEvent;
use crate::chat::Caller;

/// Represents an active WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique session ID for this connection
    pub session_id: Uuid,

    /// Who is on the other end, resolved at handshake
    pub caller: Caller,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    /// Set of chat IDs this connection is subscribed to
    pub subscriptions: Arc<RwLock<HashSet<Uuid>>>,
}

impl Connection {
    /// Create a new connection
    pub fn new(caller: Caller, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            caller,
            sender,
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Ok(()) if sent successfully, Err if connection is closed
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }

    /// Record a chat subscription. Returns `false` if it was already present.
    pub async fn subscribe(&self, chat_id: Uuid) -> bool {
        let mut subs = self.subscriptions.write().await;
        subs.insert(chat_id)
    }

    /// Drop a chat subscription
    pub async fn unsubscribe(&self, chat_id: Uuid) {
        let mut subs = self.subscriptions.write().await;
        subs.remove(&chat_id);
    }

    /// Check if subscribed to a chat
    pub async fn is_subscribed(&self, chat_id: &Uuid) -> bool {
        let subs = self.subscriptions.read().await;
        subs.contains(chat_id)
    }
}
