//! Realtime gateway: connection registry plus conversation rooms
//!
//! One instance is created at startup and shared through `AppState`.
//! Delivery is at-most-once with no replay; clients that miss events
//! re-fetch history over REST.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use chatdesk_shared::ConversationMessage;

use super::connection::Connection;
use super::events::ServerEvent;
use super::room::RoomManager;
use crate::auth::Principal;

#[derive(Clone)]
pub struct RealtimeGateway {
    /// All active connections indexed by connection_id
    connections: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,

    rooms: Arc<RoomManager>,
}

impl RealtimeGateway {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RoomManager::new()),
        }
    }

    /// Register a connection for an authenticated principal
    pub async fn connect(
        &self,
        principal: Principal,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> Arc<Connection> {
        let conn = Arc::new(Connection::new(principal, sender));
        let mut connections = self.connections.write().await;
        connections.insert(conn.connection_id, Arc::clone(&conn));

        tracing::info!(
            connection_id = %conn.connection_id,
            subject = %conn.principal.subject(),
            total_connections = connections.len(),
            "WebSocket connection added"
        );

        conn
    }

    /// Drop a connection and leave every room it joined
    pub async fn disconnect(&self, connection_id: &Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.remove(connection_id) {
            let rooms_left = self.rooms.remove_connection(connection_id).await;

            tracing::info!(
                connection_id = %connection_id,
                subject = %conn.principal.subject(),
                rooms_left,
                remaining_connections = connections.len(),
                "WebSocket connection removed"
            );
        }
    }

    /// Subscribe a connection to a conversation room. Idempotent.
    pub async fn join(&self, connection_id: &Uuid, conversation_id: Uuid) -> Result<(), GatewayError> {
        let conn = self
            .connection(connection_id)
            .await
            .ok_or(GatewayError::UnknownConnection(*connection_id))?;

        conn.track_room(conversation_id).await;
        self.rooms.join(conversation_id, conn).await;
        Ok(())
    }

    pub async fn leave(&self, connection_id: &Uuid, conversation_id: &Uuid) {
        if let Some(conn) = self.connection(connection_id).await {
            conn.untrack_room(conversation_id).await;
        }
        self.rooms.leave(conversation_id, connection_id).await;
    }

    /// Deliver a new message to the conversation's room.
    /// Returns how many connections it reached; zero is not an error.
    pub async fn broadcast(&self, conversation_id: Uuid, message: &ConversationMessage) -> usize {
        self.publish(conversation_id, ServerEvent::NewMessage(message.clone()))
            .await
    }

    pub async fn publish(&self, conversation_id: Uuid, event: ServerEvent) -> usize {
        self.rooms.broadcast(&conversation_id, &event).await
    }

    pub async fn connection(&self, connection_id: &Uuid) -> Option<Arc<Connection>> {
        self.connections.read().await.get(connection_id).cloned()
    }

    pub async fn room_size(&self, conversation_id: &Uuid) -> usize {
        self.rooms.room_size(conversation_id).await
    }

    pub async fn stats(&self) -> GatewayStats {
        GatewayStats {
            active_connections: self.connections.read().await.len(),
            active_rooms: self.rooms.room_count().await,
        }
    }
}

impl Default for RealtimeGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about live connections
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewayStats {
    pub active_connections: usize,
    pub active_rooms: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Unknown connection: {0}")]
    UnknownConnection(Uuid),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chatdesk_shared::MessageSender;
    use time::OffsetDateTime;

    fn message(conversation_id: Uuid) -> ConversationMessage {
        ConversationMessage::new(
            conversation_id,
            "hello",
            MessageSender::Consumer,
            OffsetDateTime::now_utc(),
        )
    }

    async fn connected(
        gateway: &RealtimeGateway,
    ) -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = gateway.connect(Principal::consumer(Uuid::new_v4()), tx).await;
        (conn, rx)
    }

    #[tokio::test]
    async fn test_two_subscribers_receive_identical_payload() {
        let gateway = RealtimeGateway::new();
        let conversation_id = Uuid::new_v4();
        let (a, mut rx_a) = connected(&gateway).await;
        let (b, mut rx_b) = connected(&gateway).await;

        gateway.join(&a.connection_id, conversation_id).await.unwrap();
        gateway.join(&b.connection_id, conversation_id).await.unwrap();

        let msg = message(conversation_id);
        assert_eq!(gateway.broadcast(conversation_id, &msg).await, 2);

        let payload_a = serde_json::to_string(&rx_a.try_recv().unwrap()).unwrap();
        let payload_b = serde_json::to_string(&rx_b.try_recv().unwrap()).unwrap();
        assert_eq!(payload_a, payload_b);
        assert!(payload_a.contains("newMessage"));
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let gateway = RealtimeGateway::new();
        let conversation_id = Uuid::new_v4();
        assert_eq!(gateway.broadcast(conversation_id, &message(conversation_id)).await, 0);
    }

    #[tokio::test]
    async fn test_late_joiner_gets_no_replay() {
        let gateway = RealtimeGateway::new();
        let conversation_id = Uuid::new_v4();
        let (conn, mut rx) = connected(&gateway).await;

        gateway.broadcast(conversation_id, &message(conversation_id)).await;
        gateway.join(&conn.connection_id, conversation_id).await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_leaves_all_rooms() {
        let gateway = RealtimeGateway::new();
        let (conn, _rx) = connected(&gateway).await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        gateway.join(&conn.connection_id, first).await.unwrap();
        gateway.join(&conn.connection_id, second).await.unwrap();
        assert_eq!(gateway.stats().await.active_rooms, 2);

        gateway.disconnect(&conn.connection_id).await;

        let stats = gateway.stats().await;
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.active_rooms, 0);
        assert_eq!(gateway.broadcast(first, &message(first)).await, 0);
    }

    #[tokio::test]
    async fn test_leave_stops_delivery() {
        let gateway = RealtimeGateway::new();
        let conversation_id = Uuid::new_v4();
        let (conn, mut rx) = connected(&gateway).await;

        gateway.join(&conn.connection_id, conversation_id).await.unwrap();
        gateway.leave(&conn.connection_id, &conversation_id).await;

        assert_eq!(gateway.broadcast(conversation_id, &message(conversation_id)).await, 0);
        assert!(rx.try_recv().is_err());
        assert!(conn.joined_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_join_unknown_connection() {
        let gateway = RealtimeGateway::new();
        assert!(matches!(
            gateway.join(&Uuid::new_v4(), Uuid::new_v4()).await,
            Err(GatewayError::UnknownConnection(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_joins_keep_room_consistent() {
        let gateway = RealtimeGateway::new();
        let conversation_id = Uuid::new_v4();

        let mut receivers = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let (conn, rx) = connected(&gateway).await;
            receivers.push(rx);
            let gateway = gateway.clone();
            handles.push(tokio::spawn(async move {
                gateway.join(&conn.connection_id, conversation_id).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(gateway.room_size(&conversation_id).await, 16);
        assert_eq!(gateway.broadcast(conversation_id, &message(conversation_id)).await, 16);
    }
}
