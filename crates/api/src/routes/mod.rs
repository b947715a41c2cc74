//! API routes

pub mod attendants;
pub mod auth;
pub mod consumers;
pub mod conversations;
pub mod health;
pub mod users;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use chatdesk_shared::Page;

use crate::{auth::require_auth, state::AppState, websocket::ws_handler};

/// `skip`/`take` pagination query
#[derive(Debug, Default, Deserialize)]
pub struct SkipTake {
    pub skip: Option<i64>,
    pub take: Option<i64>,
}

impl SkipTake {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.take)
    }
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Health check routes
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    let public_routes = Router::new()
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/consumers/sign-in", post(consumers::sign_in))
        .route("/consumers/refresh-token", post(consumers::refresh_token));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Staff users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:user_id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        // Consumers
        .route("/consumers", get(consumers::list_consumers))
        .route(
            "/consumers/:consumer_id",
            get(consumers::get_consumer)
                .patch(consumers::update_consumer)
                .delete(consumers::delete_consumer),
        )
        .route(
            "/consumers/:consumer_id/conversations",
            get(consumers::list_consumer_conversations).post(consumers::create_conversation),
        )
        // Conversations
        .route("/conversations", get(conversations::list_conversations))
        .route(
            "/conversations/:conversation_id",
            get(conversations::get_conversation).delete(conversations::close_conversation),
        )
        .route(
            "/conversations/:conversation_id/messages",
            get(conversations::list_messages).post(conversations::post_message),
        )
        .route("/attendants/workload", get(attendants::workload))
        .layer(middleware::from_fn_with_state(auth_state, require_auth));

    // WebSocket (auth handled in handler via query parameter)
    let websocket_routes = Router::new().route("/ws", get(ws_handler));

    Router::new()
        .merge(health_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .merge(websocket_routes)
        .with_state(state)
}
