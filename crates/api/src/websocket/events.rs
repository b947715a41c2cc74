//! WebSocket event types and serialization
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use chatdesk_shared::ConversationMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Subscribe to a conversation's messages
    JoinConversation(Uuid),

    LeaveConversation(Uuid),

    /// Heartbeat ping to keep connection alive
    Ping,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Connection acknowledged
    Connected { connection_id: Uuid },

    /// Message appended to a joined conversation (full record)
    NewMessage(ConversationMessage),

    ConversationClosed { conversation_id: Uuid },

    /// Heartbeat response
    Pong,

    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::NewMessage(_) => "newMessage",
            ServerEvent::ConversationClosed { .. } => "conversationClosed",
            ServerEvent::Pong => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chatdesk_shared::MessageSender;
    use time::OffsetDateTime;

    #[test]
    fn test_client_event_deserialization() {
        let json = r#"{"event":"joinConversation","data":"550e8400-e29b-41d4-a716-446655440000"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinConversation(
                Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()
            )
        );

        let event: ClientEvent = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(event, ClientEvent::Ping);
    }

    #[test]
    fn test_unknown_client_event_fails() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"typing","data":1}"#).is_err());
    }

    #[test]
    fn test_server_event_serialization() {
        let json = serde_json::to_string(&ServerEvent::Pong).unwrap();
        assert_eq!(json, r#"{"event":"pong"}"#);
    }

    #[test]
    fn test_new_message_carries_full_record() {
        let message = ConversationMessage::new(
            Uuid::new_v4(),
            "hello",
            MessageSender::Attendant,
            OffsetDateTime::now_utc(),
        );
        let event = ServerEvent::NewMessage(message.clone());
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], event.name());
        assert_eq!(value["data"]["id"], message.id.to_string());
        assert_eq!(value["data"]["content"], "hello");
        assert_eq!(value["data"]["sender"], "attendant");
    }
}
