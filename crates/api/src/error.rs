//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatdesk_shared::StoreError;
use serde_json::json;

use crate::auth::{AuthError, PasswordError};
use crate::services::{AssignmentError, IngestError, NotFoundError, ValidationError};

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // Resource errors
    #[error("Resource not found")]
    NotFound,
    #[error("Resource already exists")]
    Conflict(String),

    // Routing
    #[error("No attendants available")]
    NoAttendantsAvailable,

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Authentication
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", self.to_string()),
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),

            // Validation
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            // Resources
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),

            // Routing
            ApiError::NoAttendantsAvailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NO_ATTENDANTS_AVAILABLE",
                "No attendants are available right now. Please try again shortly.".to_string(),
            ),

            // Internal
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Database error".to_string()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.to_string()),
            ApiError::ServiceUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", self.to_string()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Unavailable(msg) => {
                tracing::error!(error = %msg, "Store unavailable");
                ApiError::ServiceUnavailable
            }
            StoreError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                ApiError::Database(e.to_string())
            }
        }
    }
}

/// Token failures collapse into one response so callers cannot tell
/// an expired token from a forged one
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Encoding(e) => {
                tracing::error!(error = %e, "Token encoding failed");
                ApiError::Internal
            }
            other => {
                tracing::debug!(error = %other, "Token rejected");
                ApiError::InvalidToken
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "Password hashing error");
        ApiError::Internal
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<NotFoundError> for ApiError {
    fn from(err: NotFoundError) -> Self {
        tracing::debug!(error = %err, "Not found");
        ApiError::NotFound
    }
}

impl From<AssignmentError> for ApiError {
    fn from(err: AssignmentError) -> Self {
        match err {
            AssignmentError::NoAttendantsAvailable => {
                tracing::warn!("Conversation rejected: no attendants available");
                ApiError::NoAttendantsAvailable
            }
            AssignmentError::Store(e) => e.into(),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Validation(e) => e.into(),
            IngestError::NotFound(e) => e.into(),
            IngestError::Assignment(e) => e.into(),
            IngestError::Store(e) => e.into(),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_are_indistinguishable() {
        let statuses: Vec<StatusCode> = [
            AuthError::ExpiredToken,
            AuthError::InvalidSignature,
            AuthError::WrongAudience,
            AuthError::MalformedSubject,
        ]
        .into_iter()
        .map(|e| ApiError::from(e).into_response().status())
        .collect();

        assert!(statuses.iter().all(|s| *s == StatusCode::UNAUTHORIZED));
        assert!(matches!(
            ApiError::from(AuthError::ExpiredToken),
            ApiError::InvalidToken
        ));
        assert!(matches!(
            ApiError::from(AuthError::InvalidSignature),
            ApiError::InvalidToken
        ));
    }

    #[test]
    fn test_no_attendants_is_service_unavailable() {
        let response = ApiError::from(AssignmentError::NoAttendantsAvailable).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_validation_names_field() {
        let err = ApiError::from(ValidationError::InvalidDate {
            field: "messages.0.createdAt".into(),
        });
        match err {
            ApiError::Validation(msg) => assert!(msg.contains("messages.0.createdAt")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
