//! Bearer-token authentication middleware

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chatdesk_shared::{Conversation, Scope};
use uuid::Uuid;

use super::jwt::{Principal, TokenService};
use crate::error::{ApiError, ApiResult};

/// State needed by the auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub tokens: TokenService,
}

/// Verified caller, attached to the request as an extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub principal: Principal,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        self.principal.is_staff()
    }

    /// Staff with the given scope
    pub fn require_scope(&self, scope: Scope) -> ApiResult<()> {
        if self.principal.has_scope(scope) {
            Ok(())
        } else {
            tracing::debug!(subject = %self.principal.subject(), scope = %scope, "Missing scope");
            Err(ApiError::Forbidden)
        }
    }

    /// Staff with the given scope, or the consumer `consumer_id` itself
    pub fn require_scope_or_consumer(&self, scope: Scope, consumer_id: Uuid) -> ApiResult<()> {
        match &self.principal {
            Principal::Consumer { id } if *id == consumer_id => Ok(()),
            Principal::Consumer { .. } => Err(ApiError::Forbidden),
            Principal::Staff { .. } => self.require_scope(scope),
        }
    }

    /// Any staff member, or the consumer that owns the conversation
    pub fn can_access_conversation(&self, conversation: &Conversation) -> bool {
        match &self.principal {
            Principal::Staff { .. } => true,
            Principal::Consumer { id } => *id == conversation.consumer_id,
        }
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Reject requests without a valid access token
pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request).ok_or(ApiError::Unauthorized)?;

    let principal = state.tokens.verify_access(token).map_err(|e| {
        // The reason is logged, never returned
        tracing::debug!(error = %e, "Bearer token rejected");
        ApiError::InvalidToken
    })?;

    request.extensions_mut().insert(AuthUser { principal });
    Ok(next.run(request).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    const SECRET: &str = "test-secret-key-at-least-32-chars!";

    fn app() -> Router {
        let state = AuthState {
            tokens: TokenService::new(SECRET, "chatdesk"),
        };
        Router::new()
            .route(
                "/me",
                get(|Extension(user): Extension<AuthUser>| async move {
                    user.principal.id().to_string()
                }),
            )
            .layer(middleware::from_fn_with_state(state, require_auth))
    }

    fn get_with(auth: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/me");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let response = app().oneshot(get_with(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_access_token_passes() {
        let tokens = TokenService::new(SECRET, "chatdesk");
        let token = tokens
            .issue_access_token(&Principal::consumer(Uuid::new_v4()))
            .unwrap();
        let response = app()
            .oneshot(get_with(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_token_is_rejected() {
        let tokens = TokenService::new(SECRET, "chatdesk");
        let token = tokens.issue_refresh_token(Uuid::new_v4()).unwrap();
        let response = app()
            .oneshot(get_with(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_consumer_ownership() {
        let me = Uuid::new_v4();
        let user = AuthUser {
            principal: Principal::consumer(me),
        };
        assert!(user
            .require_scope_or_consumer(Scope::ConsumersRead, me)
            .is_ok());
        assert!(user
            .require_scope_or_consumer(Scope::ConsumersRead, Uuid::new_v4())
            .is_err());
        assert!(user.require_scope(Scope::ConversationsRead).is_err());
    }
}
