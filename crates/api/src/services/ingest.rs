//! Conversation and message ingest
//!
//! Creation is all-or-nothing: validation, assignment and persistence all
//! happen before anything is written, and the conversation plus its opening
//! messages are stored as one unit. Realtime notification happens after the
//! write and never fails the call.

use std::sync::Arc;

use chatdesk_shared::{
    Conversation, ConversationMessage, MessageSender, Store, StoreError,
};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use super::assignment::{AssignmentError, AttendantAssigner};
use super::validation::{self, ValidationError};
use crate::websocket::{RealtimeGateway, ServerEvent};

/// Body of a conversation creation request, validated by the service
#[derive(Debug, Default, Deserialize)]
pub struct NewConversation {
    #[serde(default)]
    pub subject: Value,
    #[serde(default)]
    pub messages: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum NotFoundError {
    #[error("Conversation {0} not found")]
    UnknownConversation(Uuid),
    #[error("Consumer {0} not found")]
    UnknownConsumer(Uuid),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct MessageIngestService {
    store: Arc<dyn Store>,
    assigner: AttendantAssigner,
    gateway: RealtimeGateway,
}

impl MessageIngestService {
    pub fn new(store: Arc<dyn Store>, gateway: RealtimeGateway) -> Self {
        Self {
            assigner: AttendantAssigner::new(Arc::clone(&store)),
            store,
            gateway,
        }
    }

    pub fn assigner(&self) -> &AttendantAssigner {
        &self.assigner
    }

    /// Open a conversation for a consumer, routed to the least-loaded attendant
    pub async fn create_conversation(
        &self,
        consumer_id: Uuid,
        request: &NewConversation,
    ) -> Result<Conversation, IngestError> {
        let subject = validation::required_text("subject", Some(&request.subject))?;
        let opening = validation::opening_messages(Some(&request.messages))?;

        if self.store.find_consumer(consumer_id).await?.is_none() {
            return Err(NotFoundError::UnknownConsumer(consumer_id).into());
        }

        let attendant = self.assigner.assign().await?;

        let conversation = Conversation::open(consumer_id, attendant.id, &subject);
        let messages: Vec<ConversationMessage> = opening
            .iter()
            .map(|m| ConversationMessage::new(conversation.id, &m.content, m.sender, m.created_at))
            .collect();

        self.store
            .create_conversation(&conversation, &messages)
            .await?;

        tracing::info!(
            conversation_id = %conversation.id,
            consumer_id = %consumer_id,
            attendant_id = %attendant.id,
            opening_messages = messages.len(),
            "Conversation created"
        );

        // Nobody can have joined a room that did not exist; this is normally a no-op
        for message in &messages {
            self.gateway.broadcast(conversation.id, message).await;
        }

        Ok(conversation)
    }

    /// Append a message and push it to the conversation's room.
    /// Closed conversations still accept messages.
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        content: &str,
        sender: MessageSender,
    ) -> Result<ConversationMessage, IngestError> {
        let content = validation::non_empty("content", content)?;

        if self.store.find_conversation(conversation_id).await?.is_none() {
            return Err(NotFoundError::UnknownConversation(conversation_id).into());
        }

        let message = ConversationMessage::new(
            conversation_id,
            content,
            sender,
            OffsetDateTime::now_utc(),
        );
        self.store.save_message(&message).await?;

        let recipients = self.gateway.broadcast(conversation_id, &message).await;
        tracing::info!(
            conversation_id = %conversation_id,
            message_id = %message.id,
            sender = sender.as_str(),
            recipients,
            "Message appended"
        );

        Ok(message)
    }

    /// Close a conversation and tell its room
    pub async fn close_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Conversation, IngestError> {
        let conversation = self
            .store
            .close_conversation(conversation_id)
            .await?
            .ok_or(NotFoundError::UnknownConversation(conversation_id))?;

        self.gateway
            .publish(conversation_id, ServerEvent::ConversationClosed { conversation_id })
            .await;
        tracing::info!(conversation_id = %conversation_id, "Conversation closed");

        Ok(conversation)
    }
}
