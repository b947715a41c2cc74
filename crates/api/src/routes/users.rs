//! Staff user management routes

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    Json,
};
use chatdesk_shared::{Page, Profile, Scope, StoreError, User};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{validate_password, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub count: i64,
    pub page: i64,
    pub limit: i64,
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub profile: Option<Profile>,
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_username(username: &str) -> ApiResult<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::Validation("username must not be empty".to_string()));
    }
    Ok(username)
}

fn validate_email(email: &str) -> ApiResult<&str> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::Validation("email must be a valid address".to_string())),
    }
}

fn hash_password(state: &AppState, password: &str) -> ApiResult<String> {
    validate_password(password).map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok(state.hasher.generate_hash(password)?)
}

/// Duplicate email/username is a client error on this resource
async fn save(state: &AppState, user: &User) -> ApiResult<()> {
    match state.store.save_user(user).await {
        Ok(()) => Ok(()),
        Err(StoreError::Conflict(_)) => Err(ApiError::BadRequest(
            "email or username already in use".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<UserListResponse>> {
    auth_user.require_scope(Scope::UsersRead)?;

    let window = Page::numbered(query.page, query.limit);
    let (users, count) = state.store.find_users(window).await?;

    Ok(Json(UserListResponse {
        count,
        page: window.skip / window.take + 1,
        limit: window.take,
        users,
    }))
}

/// GET /users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    auth_user.require_scope(Scope::UsersRead)?;

    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(user))
}

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, [(header::HeaderName, String); 1], Json<User>)> {
    auth_user.require_scope(Scope::UsersWrite)?;

    let username = validate_username(&req.username)?;
    let email = validate_email(&req.email)?;
    let password_hash = hash_password(&state, &req.password)?;

    let user = User::new(username, email, req.profile, password_hash);
    save(&state, &user).await?;

    tracing::info!(
        user_id = %user.id,
        profile = user.profile.as_str(),
        created_by = %auth_user.principal.id(),
        "User created"
    );

    let location = format!("/users/{}", user.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(user)))
}

/// PATCH /users/:user_id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    auth_user.require_scope(Scope::UsersWrite)?;

    let mut user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if let Some(username) = &req.username {
        user.username = validate_username(username)?.to_string();
    }
    if let Some(email) = &req.email {
        user.email = validate_email(email)?.to_string();
    }
    if let Some(password) = &req.password {
        user.password_hash = hash_password(&state, password)?;
    }
    if let Some(profile) = req.profile {
        user.profile = profile;
    }
    user.updated_at = OffsetDateTime::now_utc();

    save(&state, &user).await?;
    tracing::info!(user_id = %user.id, updated_by = %auth_user.principal.id(), "User updated");

    Ok(Json(user))
}

/// DELETE /users/:user_id
///
/// Soft delete. A removed user stops receiving new conversations; the
/// conversations already assigned keep their attendant.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    auth_user.require_scope(Scope::UsersWrite)?;

    if auth_user.principal.id() == user_id {
        return Err(ApiError::BadRequest("Cannot remove yourself".to_string()));
    }

    if !state.store.remove_user(user_id).await? {
        return Err(ApiError::NotFound);
    }

    tracing::info!(user_id = %user_id, removed_by = %auth_user.principal.id(), "User removed");
    Ok(StatusCode::NO_CONTENT)
}
