//! Chatdesk API Library
//!
//! Support-chat server: staff and consumer sessions, least-loaded attendant
//! assignment, conversation ingest and realtime delivery over websockets.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
