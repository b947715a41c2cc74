//! Conversation and message routes

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    Json,
};
use chatdesk_shared::{
    Conversation, ConversationFilter, ConversationMessage, ConversationStatus, MessageSender,
    Page, Scope,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{consumers::ConversationListResponse, SkipTake};
use crate::{
    auth::{AuthUser, Principal},
    error::{ApiError, ApiResult},
    services::validation,
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    pub status: Option<ConversationStatus>,
    pub attendant_id: Option<Uuid>,
    pub skip: Option<i64>,
    pub take: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub count: i64,
    pub messages: Vec<ConversationMessage>,
}

/// Load a conversation the caller may see.
///
/// Staff see every conversation; a consumer only its own.
async fn visible_conversation(
    state: &AppState,
    auth_user: &AuthUser,
    conversation_id: Uuid,
) -> ApiResult<Conversation> {
    let conversation = state
        .store
        .find_conversation(conversation_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !auth_user.can_access_conversation(&conversation) {
        return Err(ApiError::Forbidden);
    }
    if auth_user.is_staff() {
        auth_user.require_scope(Scope::ConversationsRead)?;
    }
    Ok(conversation)
}

/// GET /conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ConversationQuery>,
) -> ApiResult<Json<ConversationListResponse>> {
    auth_user.require_scope(Scope::ConversationsRead)?;

    let filter = ConversationFilter {
        status: query.status,
        attendant_id: query.attendant_id,
        ..Default::default()
    };
    let (conversations, count) = state
        .store
        .find_conversations(&filter, Page::new(query.skip, query.take))
        .await?;

    Ok(Json(ConversationListResponse {
        count,
        conversations,
    }))
}

/// GET /conversations/:conversation_id
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<Json<Conversation>> {
    let conversation = visible_conversation(&state, &auth_user, conversation_id).await?;
    Ok(Json(conversation))
}

/// DELETE /conversations/:conversation_id
pub async fn close_conversation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<Json<Conversation>> {
    auth_user.require_scope(Scope::ConversationsWrite)?;

    let conversation = state.ingest.close_conversation(conversation_id).await?;
    Ok(Json(conversation))
}

/// GET /conversations/:conversation_id/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<SkipTake>,
) -> ApiResult<Json<MessageListResponse>> {
    visible_conversation(&state, &auth_user, conversation_id).await?;

    let (messages, count) = state
        .store
        .find_messages(conversation_id, query.page())
        .await?;
    Ok(Json(MessageListResponse { count, messages }))
}

/// POST /conversations/:conversation_id/messages
///
/// The sender is derived from the caller: staff post as the attendant,
/// the owning consumer as the consumer.
pub async fn post_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, [(header::HeaderName, String); 1], Json<ConversationMessage>)> {
    let content = validation::required_text("content", Some(&req.content))?;

    let sender = match &auth_user.principal {
        Principal::Staff { .. } => {
            auth_user.require_scope(Scope::ConversationsWrite)?;
            MessageSender::Attendant
        }
        Principal::Consumer { .. } => {
            visible_conversation(&state, &auth_user, conversation_id).await?;
            MessageSender::Consumer
        }
    };

    let message = state
        .ingest
        .append_message(conversation_id, &content, sender)
        .await?;
    let location = format!("/conversations/{}/messages", conversation_id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(message),
    ))
}
