//! Persistence capability consumed by the routing core
//!
//! The core only needs find / count / save / remove primitives over users,
//! consumers, conversations and messages. Two implementations ship:
//!
//! - [`PgStore`]: PostgreSQL via sqlx
//! - [`MemoryStore`]: in-process tables behind a single lock

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{Consumer, Conversation, ConversationFilter, ConversationMessage, Page, User};

#[async_trait]
pub trait Store: Send + Sync {
    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    /// Find an active (not removed) user by id
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Find an active user whose email or username equals `login`
    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>>;

    /// Page of active users plus the total count
    async fn find_users(&self, page: Page) -> StoreResult<(Vec<User>, i64)>;

    /// All active users eligible for assignment, in stable enumeration order
    async fn list_attendants(&self) -> StoreResult<Vec<User>>;

    /// Insert or update a user. Duplicate email/username is a conflict.
    async fn save_user(&self, user: &User) -> StoreResult<()>;

    /// Soft-remove a user. Returns false when no active user had that id.
    async fn remove_user(&self, id: Uuid) -> StoreResult<bool>;

    // -------------------------------------------------------------------------
    // Consumers
    // -------------------------------------------------------------------------

    async fn find_consumer(&self, id: Uuid) -> StoreResult<Option<Consumer>>;

    /// Return the consumer with this document, creating it if absent.
    /// Concurrent calls for one document yield a single record.
    async fn find_or_create_consumer(&self, document: &str) -> StoreResult<Consumer>;

    async fn find_consumers(&self, page: Page) -> StoreResult<(Vec<Consumer>, i64)>;

    /// Update a consumer. Reusing another consumer's document is a conflict.
    async fn save_consumer(&self, consumer: &Consumer) -> StoreResult<()>;

    /// Delete a consumer together with its conversations and their messages.
    /// Returns false when no consumer had that id.
    async fn remove_consumer(&self, id: Uuid) -> StoreResult<bool>;

    // -------------------------------------------------------------------------
    // Conversations
    // -------------------------------------------------------------------------

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>>;

    /// Page of matching conversations, newest first, plus the total count
    async fn find_conversations(
        &self,
        filter: &ConversationFilter,
        page: Page,
    ) -> StoreResult<(Vec<Conversation>, i64)>;

    async fn count_conversations(&self, filter: &ConversationFilter) -> StoreResult<i64>;

    /// Persist a conversation and its opening messages as one unit:
    /// either every row exists afterwards or none does.
    async fn create_conversation(
        &self,
        conversation: &Conversation,
        messages: &[ConversationMessage],
    ) -> StoreResult<()>;

    /// Mark a conversation closed. Returns the updated record, or None if unknown.
    async fn close_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>>;

    // -------------------------------------------------------------------------
    // Messages
    // -------------------------------------------------------------------------

    async fn save_message(&self, message: &ConversationMessage) -> StoreResult<()>;

    /// Page of a conversation's messages ordered newest first by `(created_at, id)`
    async fn find_messages(
        &self,
        conversation_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<ConversationMessage>, i64)>;

    /// Connectivity check backing readiness
    async fn ping(&self) -> StoreResult<()>;
}
