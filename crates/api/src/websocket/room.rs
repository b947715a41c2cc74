//! Conversation room management for pub/sub
//!
//! A room is the set of live connections subscribed to one conversation.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;

type Members = HashMap<Uuid, Arc<Connection>>;

/// Manages conversation rooms for broadcasting events
pub struct RoomManager {
    /// conversation_id -> (connection_id -> connection)
    rooms: RwLock<HashMap<Uuid, Members>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to a room. Joining twice is a no-op; returns false then.
    pub async fn join(&self, conversation_id: Uuid, conn: Arc<Connection>) -> bool {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(conversation_id).or_default();
        let connection_id = conn.connection_id;
        let added = members.insert(connection_id, conn).is_none();

        tracing::debug!(
            conversation_id = %conversation_id,
            connection_id = %connection_id,
            room_size = members.len(),
            added,
            "Connection joined conversation room"
        );
        added
    }

    /// Remove a connection from a room
    pub async fn leave(&self, conversation_id: &Uuid, connection_id: &Uuid) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(conversation_id) else {
            return false;
        };
        let removed = members.remove(connection_id).is_some();

        // Clean up empty rooms
        if members.is_empty() {
            rooms.remove(conversation_id);
            tracing::debug!(conversation_id = %conversation_id, "Removed empty conversation room");
        } else if removed {
            tracing::debug!(
                conversation_id = %conversation_id,
                connection_id = %connection_id,
                room_size = members.len(),
                "Connection left conversation room"
            );
        }
        removed
    }

    /// Send an event to every connection in the room at call time.
    /// Returns the number of connections it was handed to.
    pub async fn broadcast(&self, conversation_id: &Uuid, event: &ServerEvent) -> usize {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(conversation_id) else {
            tracing::debug!(
                conversation_id = %conversation_id,
                event = event.name(),
                "No subscribers for conversation"
            );
            return 0;
        };

        let mut delivered = 0;
        let mut failed = 0;
        for conn in members.values() {
            match conn.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    // Closed connections are cleaned up by their own disconnect
                    failed += 1;
                    tracing::warn!(
                        connection_id = %conn.connection_id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(
            conversation_id = %conversation_id,
            event = event.name(),
            recipients = delivered,
            failed,
            "Broadcast event to conversation room"
        );
        delivered
    }

    /// Remove a connection from every room
    pub async fn remove_connection(&self, connection_id: &Uuid) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut removed_from = 0;

        for members in rooms.values_mut() {
            if members.remove(connection_id).is_some() {
                removed_from += 1;
            }
        }
        rooms.retain(|_, members| !members.is_empty());

        if removed_from > 0 {
            tracing::debug!(
                connection_id = %connection_id,
                room_count = removed_from,
                "Removed connection from rooms"
            );
        }
        removed_from
    }

    pub async fn room_size(&self, conversation_id: &Uuid) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(conversation_id).map(|m| m.len()).unwrap_or(0)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use tokio::sync::mpsc;

    fn connection() -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Connection::new(Principal::consumer(Uuid::new_v4()), tx)),
            rx,
        )
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let rooms = RoomManager::new();
        let conversation_id = Uuid::new_v4();
        let (conn, mut rx) = connection();

        assert!(rooms.join(conversation_id, Arc::clone(&conn)).await);
        assert!(!rooms.join(conversation_id, Arc::clone(&conn)).await);
        assert_eq!(rooms.room_size(&conversation_id).await, 1);

        // One membership means one delivery
        assert_eq!(rooms.broadcast(&conversation_id, &ServerEvent::Pong).await, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_room_join_and_leave() {
        let rooms = RoomManager::new();
        let conversation_id = Uuid::new_v4();
        let (conn, _rx) = connection();

        rooms.join(conversation_id, Arc::clone(&conn)).await;
        assert!(rooms.leave(&conversation_id, &conn.connection_id).await);
        assert_eq!(rooms.room_size(&conversation_id).await, 0);
        assert_eq!(rooms.room_count().await, 0);
        assert!(!rooms.leave(&conversation_id, &conn.connection_id).await);
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_room() {
        let rooms = RoomManager::new();
        assert_eq!(rooms.broadcast(&Uuid::new_v4(), &ServerEvent::Pong).await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_skips_closed_connection() {
        let rooms = RoomManager::new();
        let conversation_id = Uuid::new_v4();
        let (open, mut open_rx) = connection();
        let (closed, closed_rx) = connection();
        drop(closed_rx);

        rooms.join(conversation_id, open).await;
        rooms.join(conversation_id, closed).await;

        assert_eq!(rooms.broadcast(&conversation_id, &ServerEvent::Pong).await, 1);
        assert!(open_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_remove_connection_from_all_rooms() {
        let rooms = RoomManager::new();
        let (conn, _rx) = connection();

        rooms.join(Uuid::new_v4(), Arc::clone(&conn)).await;
        rooms.join(Uuid::new_v4(), Arc::clone(&conn)).await;
        assert_eq!(rooms.room_count().await, 2);

        assert_eq!(rooms.remove_connection(&conn.connection_id).await, 2);
        assert_eq!(rooms.room_count().await, 0);
    }
}
