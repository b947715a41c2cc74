//! Chatdesk shared types and persistence
//!
//! Domain records, the `Store` capability and its PostgreSQL / in-process
//! implementations, shared by the API server and its tools.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use db::*;
pub use error::*;
pub use store::{MemoryStore, PgStore, Store};
pub use types::*;
