//! Staff sign-in and identity routes

use axum::{
    extract::{Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{jwt::STAFF_ACCESS_TTL, AuthUser, Principal, Subject, DUMMY_HASH},
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Advertised staff token lifetime in seconds
pub const STAFF_EXPIRES_IN: i64 = STAFF_ACCESS_TTL.whole_seconds();

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    /// Username or email
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub kind: &'static str,
    pub id: Uuid,
    pub scopes: Vec<String>,
}

/// POST /auth/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<Json<SignInResponse>> {
    let login = req.username.trim();
    if login.is_empty() || req.password.is_empty() {
        return Err(ApiError::InvalidCredentials);
    }

    let Some(user) = state.store.find_user_by_login(login).await? else {
        // Same hashing work as a known login
        let _ = state.hasher.compare_hash(&req.password, DUMMY_HASH);
        tracing::info!(login = %login, "sign_in: unknown login");
        return Err(ApiError::InvalidCredentials);
    };

    if !state.hasher.compare_hash(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "sign_in: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let access_token = state.tokens.issue_access_token(&Principal::staff(&user))?;
    tracing::info!(user_id = %user.id, profile = user.profile.as_str(), "Staff signed in");

    Ok(Json(SignInResponse {
        access_token,
        token_type: "Bearer",
        expires_in: STAFF_EXPIRES_IN,
    }))
}

/// GET /auth/me
pub async fn me(Extension(auth_user): Extension<AuthUser>) -> Json<MeResponse> {
    let principal = &auth_user.principal;
    let kind = match principal.subject() {
        Subject::User(_) => "user",
        Subject::Consumer(_) => "consumer",
    };
    Json(MeResponse {
        kind,
        id: principal.id(),
        scopes: principal
            .scopes()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
    })
}
