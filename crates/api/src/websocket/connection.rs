//! WebSocket connection management
//!
//! Represents a live, authenticated connection and the rooms it has joined.

use std::collections::HashSet;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::events::ServerEvent;
use crate::auth::Principal;

/// Represents an active WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique ID for this connection
    pub connection_id: Uuid,

    /// Identity verified at upgrade time
    pub principal: Principal,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    /// Conversation rooms this connection has joined
    pub rooms: RwLock<HashSet<Uuid>>,
}

impl Connection {
    pub fn new(principal: Principal, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            principal,
            sender,
            rooms: RwLock::new(HashSet::new()),
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Err if the receiving side has gone away
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }

    /// Record a joined room. Returns false if it was already joined.
    pub async fn track_room(&self, conversation_id: Uuid) -> bool {
        self.rooms.write().await.insert(conversation_id)
    }

    pub async fn untrack_room(&self, conversation_id: &Uuid) -> bool {
        self.rooms.write().await.remove(conversation_id)
    }

    pub async fn joined_rooms(&self) -> HashSet<Uuid> {
        self.rooms.read().await.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_room_tracking() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Connection::new(Principal::consumer(Uuid::new_v4()), tx);
        let conversation_id = Uuid::new_v4();

        assert!(conn.track_room(conversation_id).await);
        assert!(!conn.track_room(conversation_id).await);
        assert_eq!(conn.joined_rooms().await.len(), 1);

        assert!(conn.untrack_room(&conversation_id).await);
        assert!(conn.joined_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::new(Principal::consumer(Uuid::new_v4()), tx);
        drop(rx);
        assert!(conn.send(ServerEvent::Pong).is_err());
    }
}
