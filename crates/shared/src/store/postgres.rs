//! PostgreSQL store

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    Consumer, Conversation, ConversationFilter, ConversationMessage, ConversationStatus, Page,
    User,
};

const USER_COLUMNS: &str =
    "id, username, email, profile, password_hash, created_at, updated_at, deleted_at";
const CONSUMER_COLUMNS: &str = "id, document, name, created_at, updated_at";
const CONVERSATION_COLUMNS: &str =
    "id, consumer_id, attendant_id, subject, status, created_at, closed_at";

// `$n::type IS NULL OR ...` keeps one statement for every filter combination
const CONVERSATION_FILTER: &str = r#"
    ($1::uuid IS NULL OR consumer_id = $1)
    AND ($2::uuid IS NULL OR attendant_id = $2)
    AND ($3::varchar IS NULL OR status = $3)
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE (email = $1 OR username = $1) AND deleted_at IS NULL \
             ORDER BY created_at, id LIMIT 1"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_users(&self, page: Page) -> StoreResult<(Vec<User>, i64)> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL \
             ORDER BY created_at, id LIMIT $1 OFFSET $2"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(page.take)
            .bind(page.skip)
            .fetch_all(&self.pool)
            .await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok((users, count))
    }

    async fn list_attendants(&self) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY created_at, id"
        );
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, profile, password_hash, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
              username = EXCLUDED.username,
              email = EXCLUDED.email,
              profile = EXCLUDED.profile,
              password_hash = EXCLUDED.password_hash,
              updated_at = EXCLUDED.updated_at,
              deleted_at = EXCLUDED.deleted_at
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.profile)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn remove_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_consumer(&self, id: Uuid) -> StoreResult<Option<Consumer>> {
        let sql = format!("SELECT {CONSUMER_COLUMNS} FROM consumers WHERE id = $1");
        let consumer = sqlx::query_as::<_, Consumer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(consumer)
    }

    async fn find_or_create_consumer(&self, document: &str) -> StoreResult<Consumer> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let sql = format!(
            "INSERT INTO consumers (id, document, name, created_at, updated_at) \
             VALUES ($1, $2, NULL, NOW(), NOW()) \
             ON CONFLICT (document) DO UPDATE SET document = EXCLUDED.document \
             RETURNING {CONSUMER_COLUMNS}"
        );
        let consumer = sqlx::query_as::<_, Consumer>(&sql)
            .bind(Uuid::new_v4())
            .bind(document)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(consumer)
    }

    async fn find_consumers(&self, page: Page) -> StoreResult<(Vec<Consumer>, i64)> {
        let sql = format!(
            "SELECT {CONSUMER_COLUMNS} FROM consumers ORDER BY created_at, id LIMIT $1 OFFSET $2"
        );
        let consumers = sqlx::query_as::<_, Consumer>(&sql)
            .bind(page.take)
            .bind(page.skip)
            .fetch_all(&self.pool)
            .await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM consumers")
            .fetch_one(&self.pool)
            .await?;
        Ok((consumers, count))
    }

    async fn save_consumer(&self, consumer: &Consumer) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO consumers (id, document, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
              document = EXCLUDED.document,
              name = EXCLUDED.name,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(consumer.id)
        .bind(&consumer.document)
        .bind(&consumer.name)
        .bind(consumer.created_at)
        .bind(consumer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn remove_consumer(&self, id: Uuid) -> StoreResult<bool> {
        // Conversations and messages go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM consumers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1");
        let conversation = sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(conversation)
    }

    async fn find_conversations(
        &self,
        filter: &ConversationFilter,
        page: Page,
    ) -> StoreResult<(Vec<Conversation>, i64)> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE {CONVERSATION_FILTER} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        );
        let conversations = sqlx::query_as::<_, Conversation>(&sql)
            .bind(filter.consumer_id)
            .bind(filter.attendant_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(page.take)
            .bind(page.skip)
            .fetch_all(&self.pool)
            .await?;
        let count = self.count_conversations(filter).await?;
        Ok((conversations, count))
    }

    async fn count_conversations(&self, filter: &ConversationFilter) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM conversations WHERE {CONVERSATION_FILTER}");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(filter.consumer_id)
            .bind(filter.attendant_id)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create_conversation(
        &self,
        conversation: &Conversation,
        messages: &[ConversationMessage],
    ) -> StoreResult<()> {
        // Dropping the transaction without commit rolls every row back
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, consumer_id, attendant_id, subject, status, created_at, closed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(conversation.id)
        .bind(conversation.consumer_id)
        .bind(conversation.attendant_id)
        .bind(&conversation.subject)
        .bind(conversation.status)
        .bind(conversation.created_at)
        .bind(conversation.closed_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        for message in messages {
            sqlx::query(
                r#"
                INSERT INTO conversation_messages (id, conversation_id, content, sender, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(message.id)
            .bind(message.conversation_id)
            .bind(&message.content)
            .bind(message.sender)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn close_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let sql = format!(
            "UPDATE conversations \
             SET status = $2, closed_at = COALESCE(closed_at, $3) \
             WHERE id = $1 \
             RETURNING {CONVERSATION_COLUMNS}"
        );
        let conversation = sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .bind(ConversationStatus::Closed)
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(&self.pool)
            .await?;
        Ok(conversation)
    }

    async fn save_message(&self, message: &ConversationMessage) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO conversation_messages (id, conversation_id, content, sender, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(&message.content)
        .bind(message.sender)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn find_messages(
        &self,
        conversation_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<ConversationMessage>, i64)> {
        let messages = sqlx::query_as::<_, ConversationMessage>(
            r#"
            SELECT id, conversation_id, content, sender, created_at
            FROM conversation_messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(page.take)
        .bind(page.skip)
        .fetch_all(&self.pool)
        .await?;
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM conversation_messages WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await?;
        Ok((messages, count))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
