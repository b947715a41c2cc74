//! In-process store used for local runs without PostgreSQL and for tests
//!
//! All tables sit behind one `RwLock` so compound operations (find-or-create,
//! create-with-messages) are atomic with respect to each other.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    Consumer, Conversation, ConversationFilter, ConversationMessage, ConversationStatus, Page,
    User,
};

#[derive(Default)]
struct Tables {
    // Insertion order is the enumeration order for attendants
    users: Vec<User>,
    consumers: Vec<Consumer>,
    conversations: Vec<Conversation>,
    messages: Vec<ConversationMessage>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn window<T: Clone>(rows: &[T], page: Page) -> Vec<T> {
    rows.iter()
        .skip(page.skip as usize)
        .take(page.take as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == id && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.deleted_at.is_none() && (u.email == login || u.username == login))
            .cloned())
    }

    async fn find_users(&self, page: Page) -> StoreResult<(Vec<User>, i64)> {
        let tables = self.tables.read().await;
        let active: Vec<User> = tables
            .users
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .collect();
        let count = active.len() as i64;
        Ok((window(&active, page), count))
    }

    async fn list_attendants(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;

        // Same uniqueness as the users table: soft-deleted rows still hold their names
        let clash = tables.users.iter().any(|u| {
            u.id != user.id && (u.email == user.email || u.username == user.username)
        });
        if clash {
            return Err(StoreError::Conflict(
                "email or username already in use".to_string(),
            ));
        }

        match tables.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => tables.users.push(user.clone()),
        }
        Ok(())
    }

    async fn remove_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let now = OffsetDateTime::now_utc();
        match tables
            .users
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
        {
            Some(user) => {
                user.deleted_at = Some(now);
                user.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_consumer(&self, id: Uuid) -> StoreResult<Option<Consumer>> {
        let tables = self.tables.read().await;
        Ok(tables.consumers.iter().find(|c| c.id == id).cloned())
    }

    async fn find_or_create_consumer(&self, document: &str) -> StoreResult<Consumer> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.consumers.iter().find(|c| c.document == document) {
            return Ok(existing.clone());
        }
        let consumer = Consumer::new(document);
        tables.consumers.push(consumer.clone());
        Ok(consumer)
    }

    async fn find_consumers(&self, page: Page) -> StoreResult<(Vec<Consumer>, i64)> {
        let tables = self.tables.read().await;
        let count = tables.consumers.len() as i64;
        Ok((window(&tables.consumers, page), count))
    }

    async fn save_consumer(&self, consumer: &Consumer) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .consumers
            .iter()
            .any(|c| c.id != consumer.id && c.document == consumer.document)
        {
            return Err(StoreError::Conflict("document already in use".to_string()));
        }

        match tables.consumers.iter_mut().find(|c| c.id == consumer.id) {
            Some(existing) => *existing = consumer.clone(),
            None => tables.consumers.push(consumer.clone()),
        }
        Ok(())
    }

    async fn remove_consumer(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.consumers.len();
        tables.consumers.retain(|c| c.id != id);
        if tables.consumers.len() == before {
            return Ok(false);
        }

        let owned: Vec<Uuid> = tables
            .conversations
            .iter()
            .filter(|c| c.consumer_id == id)
            .map(|c| c.id)
            .collect();
        tables.conversations.retain(|c| c.consumer_id != id);
        tables
            .messages
            .retain(|m| !owned.contains(&m.conversation_id));
        Ok(true)
    }

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let tables = self.tables.read().await;
        Ok(tables.conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn find_conversations(
        &self,
        filter: &ConversationFilter,
        page: Page,
    ) -> StoreResult<(Vec<Conversation>, i64)> {
        let tables = self.tables.read().await;
        let mut matching: Vec<Conversation> = tables
            .conversations
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        let count = matching.len() as i64;
        Ok((window(&matching, page), count))
    }

    async fn count_conversations(&self, filter: &ConversationFilter) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .conversations
            .iter()
            .filter(|c| filter.matches(c))
            .count() as i64)
    }

    async fn create_conversation(
        &self,
        conversation: &Conversation,
        messages: &[ConversationMessage],
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;

        // Every check runs before the first push, so a failure writes nothing
        if !tables.consumers.iter().any(|c| c.id == conversation.consumer_id) {
            return Err(StoreError::Conflict(format!(
                "consumer {} does not exist",
                conversation.consumer_id
            )));
        }
        if !tables.users.iter().any(|u| u.id == conversation.attendant_id) {
            return Err(StoreError::Conflict(format!(
                "attendant {} does not exist",
                conversation.attendant_id
            )));
        }
        if tables.conversations.iter().any(|c| c.id == conversation.id) {
            return Err(StoreError::Conflict(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        if let Some(stray) = messages
            .iter()
            .find(|m| m.conversation_id != conversation.id)
        {
            return Err(StoreError::Conflict(format!(
                "message {} belongs to another conversation",
                stray.id
            )));
        }

        tables.conversations.push(conversation.clone());
        tables.messages.extend(messages.iter().cloned());
        Ok(())
    }

    async fn close_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let mut tables = self.tables.write().await;
        let Some(conversation) = tables.conversations.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        conversation.status = ConversationStatus::Closed;
        if conversation.closed_at.is_none() {
            conversation.closed_at = Some(OffsetDateTime::now_utc());
        }
        Ok(Some(conversation.clone()))
    }

    async fn save_message(&self, message: &ConversationMessage) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables
            .conversations
            .iter()
            .any(|c| c.id == message.conversation_id)
        {
            return Err(StoreError::Conflict(format!(
                "conversation {} does not exist",
                message.conversation_id
            )));
        }
        tables.messages.push(message.clone());
        Ok(())
    }

    async fn find_messages(
        &self,
        conversation_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<ConversationMessage>, i64)> {
        let tables = self.tables.read().await;
        let mut history: Vec<ConversationMessage> = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
        let count = history.len() as i64;
        Ok((window(&history, page), count))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
