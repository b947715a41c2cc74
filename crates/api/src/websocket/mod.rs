//! Realtime delivery over WebSocket
//!
//! - **Connection**: an authenticated socket and the rooms it joined
//! - **Room**: per-conversation set of connections
//! - **Gateway**: connection registry and broadcast entry point
//! - **Handler**: Axum upgrade route and client event loop
//! - **Events**: wire format for client/server frames

pub mod connection;
pub mod events;
pub mod gateway;
pub mod handler;
pub mod room;

pub use events::{ClientEvent, ServerEvent};
pub use gateway::{GatewayError, GatewayStats, RealtimeGateway};
pub use handler::ws_handler;
