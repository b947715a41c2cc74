//! WebSocket handler for Axum
//!
//! Authenticates once at upgrade via `?token=`, then routes client events.
//! The token is not re-checked for the lifetime of the socket.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::{Principal, TokenService};
use crate::state::AppState;

use super::{
    connection::Connection,
    events::{ClientEvent, ServerEvent},
};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

/// Upgrade to a WebSocket once the access token checks out
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
) -> Result<Response, StatusCode> {
    let principal = authenticate(&app_state.tokens, &params)?;

    tracing::info!(subject = %principal.subject(), "WebSocket connection upgrade requested");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, principal, app_state)))
}

/// A missing token is treated like a bad one
fn authenticate(tokens: &TokenService, params: &WebSocketQuery) -> Result<Principal, StatusCode> {
    let Some(token) = params.token.as_deref().filter(|t| !t.is_empty()) else {
        tracing::warn!("WebSocket auth failed: missing token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    tokens.verify_access(token).map_err(|e| {
        tracing::warn!(error = %e, "WebSocket auth failed: invalid token");
        StatusCode::UNAUTHORIZED
    })
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, principal: Principal, app_state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let gateway = app_state.gateway.clone();
    let conn = gateway.connect(principal, tx).await;
    let connection_id = conn.connection_id;

    let _ = conn.send(ServerEvent::Connected { connection_id });

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let Ok(msg) = msg else {
            break;
        };
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_client_event(event, Arc::clone(&conn), &app_state).await,
                Err(e) => {
                    tracing::warn!(error = ?e, message = %text, "Failed to parse client event");
                    let _ = conn.send(ServerEvent::error("Invalid event format"));
                }
            },
            Message::Close(_) => {
                tracing::info!(connection_id = %connection_id, "WebSocket close frame received");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Axum handles ping/pong automatically
            }
            Message::Binary(_) => {}
        }
    }

    tracing::info!(connection_id = %connection_id, "WebSocket connection closing");
    gateway.disconnect(&connection_id).await;
    send_task.abort();
}

async fn handle_client_event(event: ClientEvent, conn: Arc<Connection>, app_state: &AppState) {
    match event {
        ClientEvent::JoinConversation(conversation_id) => {
            join_conversation(conversation_id, &conn, app_state).await;
        }

        ClientEvent::LeaveConversation(conversation_id) => {
            app_state
                .gateway
                .leave(&conn.connection_id, &conversation_id)
                .await;
        }

        ClientEvent::Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}

/// Staff may join any conversation; a consumer only its own
async fn join_conversation(conversation_id: Uuid, conn: &Connection, app_state: &AppState) {
    let conversation = match app_state.store.find_conversation(conversation_id).await {
        Ok(Some(conversation)) => conversation,
        Ok(None) => {
            let _ = conn.send(ServerEvent::error("Conversation not found"));
            return;
        }
        Err(e) => {
            tracing::error!(error = ?e, "Failed to load conversation for join");
            let _ = conn.send(ServerEvent::error("Failed to verify access"));
            return;
        }
    };

    let allowed = match &conn.principal {
        Principal::Staff { .. } => true,
        Principal::Consumer { id } => *id == conversation.consumer_id,
    };
    if !allowed {
        tracing::warn!(
            connection_id = %conn.connection_id,
            conversation_id = %conversation_id,
            "Join refused: not the conversation owner"
        );
        let _ = conn.send(ServerEvent::error("Access denied to conversation"));
        return;
    }

    if let Err(e) = app_state
        .gateway
        .join(&conn.connection_id, conversation_id)
        .await
    {
        tracing::warn!(error = %e, "Join for a connection that already left");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn tokens() -> TokenService {
        TokenService::new("websocket-test-secret-0123456789abcdef", "chatdesk")
    }

    fn query(token: Option<&str>) -> WebSocketQuery {
        WebSocketQuery {
            token: token.map(str::to_string),
        }
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let tokens = tokens();
        assert_eq!(
            authenticate(&tokens, &query(None)).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            authenticate(&tokens, &query(Some(""))).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_only_access_tokens_upgrade() {
        let tokens = tokens();
        let consumer_id = Uuid::new_v4();

        assert_eq!(
            authenticate(&tokens, &query(Some("garbage"))).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );

        let refresh = tokens.issue_refresh_token(consumer_id).unwrap();
        assert_eq!(
            authenticate(&tokens, &query(Some(&refresh))).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );

        let access = tokens
            .issue_access_token(&Principal::consumer(consumer_id))
            .unwrap();
        let principal = authenticate(&tokens, &query(Some(&access))).unwrap();
        assert_eq!(principal.id(), consumer_id);
    }
}
