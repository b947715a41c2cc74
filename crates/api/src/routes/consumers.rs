//! Consumer sign-in, token refresh and consumer-owned resources

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    Json,
};
use chatdesk_shared::{Consumer, Conversation, ConversationFilter, Scope, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use super::SkipTake;
use crate::{
    auth::{AuthUser, Principal},
    error::{ApiError, ApiResult},
    services::{validation, NewConversation},
    state::AppState,
};

/// Lifetime advertised to consumer clients, in seconds.
///
/// The signed access token lives 60s; clients refresh on the first 401.
pub const CONSUMER_EXPIRES_IN: i64 = 600;

#[derive(Debug, Deserialize)]
pub struct ConsumerSignInRequest {
    #[serde(default)]
    pub document: Value,
}

#[derive(Debug, Serialize)]
pub struct ConsumerSignInResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Merge update: absent fields keep their value, `"name": null` clears the name
#[derive(Debug, Default, Deserialize)]
pub struct UpdateConsumerRequest {
    pub document: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<String>>,
}

/// Distinguish an explicit `null` from an absent field
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct ConsumerListResponse {
    pub count: i64,
    pub consumers: Vec<Consumer>,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub count: i64,
    pub conversations: Vec<Conversation>,
}

/// POST /consumers/sign-in
///
/// Finds or creates the consumer for `document` and issues an access and a
/// refresh token.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<ConsumerSignInRequest>,
) -> ApiResult<Json<ConsumerSignInResponse>> {
    let document = validation::required_text("document", Some(&req.document))?;
    let document = document.trim();

    let consumer = state.store.find_or_create_consumer(document).await?;

    let access_token = state
        .tokens
        .issue_access_token(&Principal::consumer(consumer.id))?;
    let refresh_token = state.tokens.issue_refresh_token(consumer.id)?;

    tracing::info!(consumer_id = %consumer.id, "Consumer signed in");

    Ok(Json(ConsumerSignInResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: CONSUMER_EXPIRES_IN,
    }))
}

/// POST /consumers/refresh-token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> ApiResult<Json<RefreshTokenResponse>> {
    let token = req
        .refresh_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("refresh_token is required".to_string()))?;

    let access_token = state.tokens.refresh(token)?;
    tracing::debug!("Consumer access token refreshed");

    Ok(Json(RefreshTokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: CONSUMER_EXPIRES_IN,
    }))
}

/// GET /consumers
pub async fn list_consumers(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<SkipTake>,
) -> ApiResult<Json<ConsumerListResponse>> {
    auth_user.require_scope(Scope::ConsumersRead)?;

    let (consumers, count) = state.store.find_consumers(query.page()).await?;
    Ok(Json(ConsumerListResponse { count, consumers }))
}

/// GET /consumers/:consumer_id
pub async fn get_consumer(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(consumer_id): Path<Uuid>,
) -> ApiResult<Json<Consumer>> {
    auth_user.require_scope_or_consumer(Scope::ConsumersRead, consumer_id)?;

    let consumer = state
        .store
        .find_consumer(consumer_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(consumer))
}

/// PATCH /consumers/:consumer_id
pub async fn update_consumer(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(consumer_id): Path<Uuid>,
    Json(req): Json<UpdateConsumerRequest>,
) -> ApiResult<Json<Consumer>> {
    auth_user.require_scope(Scope::ConsumersWrite)?;

    let mut consumer = state
        .store
        .find_consumer(consumer_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if let Some(document) = &req.document {
        consumer.document = validation::non_empty("document", document)?.trim().to_string();
    }
    if let Some(name) = req.name {
        consumer.name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    }
    consumer.updated_at = OffsetDateTime::now_utc();

    match state.store.save_consumer(&consumer).await {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => {
            return Err(ApiError::BadRequest("document already in use".to_string()))
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(consumer_id = %consumer.id, updated_by = %auth_user.principal.id(), "Consumer updated");
    Ok(Json(consumer))
}

/// DELETE /consumers/:consumer_id
///
/// Removes the consumer with its conversations and their messages.
pub async fn delete_consumer(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(consumer_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    auth_user.require_scope(Scope::ConsumersWrite)?;

    if !state.store.remove_consumer(consumer_id).await? {
        return Err(ApiError::NotFound);
    }

    tracing::info!(consumer_id = %consumer_id, removed_by = %auth_user.principal.id(), "Consumer removed");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /consumers/:consumer_id/conversations
pub async fn list_consumer_conversations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(consumer_id): Path<Uuid>,
    Query(query): Query<SkipTake>,
) -> ApiResult<Json<ConversationListResponse>> {
    auth_user.require_scope_or_consumer(Scope::ConversationsRead, consumer_id)?;

    let (conversations, count) = state
        .store
        .find_conversations(&ConversationFilter::for_consumer(consumer_id), query.page())
        .await?;
    Ok(Json(ConversationListResponse {
        count,
        conversations,
    }))
}

/// POST /consumers/:consumer_id/conversations
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(consumer_id): Path<Uuid>,
    Json(req): Json<NewConversation>,
) -> ApiResult<(StatusCode, [(header::HeaderName, String); 1], Json<Conversation>)> {
    auth_user.require_scope_or_consumer(Scope::ConversationsWrite, consumer_id)?;

    let conversation = state.ingest.create_conversation(consumer_id, &req).await?;
    let location = format!("/conversations/{}", conversation.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(conversation),
    ))
}
