//! Error types and Axum response conversions.

use crate::auth::{AuthError, AuthFailure, PasswordError};
use crate::storage::{StoreError, UserError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Message returned for every credential failure, whatever the cause.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Collapse an auth failure to what a client may learn about it.
///
/// The precise reason is logged here and nowhere in the response.
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err.class() {
            AuthFailure::Unauthenticated => {
                tracing::info!(action = "auth_rejected", reason = %err, class = "unauthenticated", "Credential rejected");
                AppError::Unauthorized(INVALID_TOKEN_MESSAGE.to_string())
            }
            AuthFailure::Internal => {
                tracing::warn!(action = "auth_failed", reason = %err, class = "internal", timeout = err.is_timeout(), "Auth operation failed");
                AppError::Internal(err.to_string())
            }
        }
    }
}

// Convenience conversions from common error types
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::EmailTaken => AppError::Conflict("Email already registered".to_string()),
            UserError::UsernameTaken => AppError::Conflict("Username already taken".to_string()),
            UserError::Store(e) => e.into(),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenError;
    use axum::http::StatusCode;

    /// Extract status code and JSON body from an AppError response.
    async fn error_response(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn test_internal_hides_details() {
        // CRITICAL: Internal error must NOT leak detailed message to client
        let (status, body) = error_response(AppError::Internal(
            "Redis connection refused at 10.0.0.5:6379".to_string(),
        ))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(!body["error"].as_str().unwrap().contains("Redis"));
        assert!(!body["error"].as_str().unwrap().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_bad_request() {
        let (status, body) =
            error_response(AppError::BadRequest("Invalid email".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid email");
    }

    #[tokio::test]
    async fn test_conflict() {
        let (status, body) =
            error_response(AppError::Conflict("Email already registered".to_string())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Email already registered");
    }

    #[tokio::test]
    async fn test_auth_failures_share_one_message() {
        for err in [
            AuthError::Token(TokenError::Expired),
            AuthError::Token(TokenError::SignatureInvalid),
            AuthError::Token(TokenError::WrongTokenKind),
            AuthError::SessionNotFound,
            AuthError::SessionMismatch,
            AuthError::InvalidSession(Box::new(AuthError::SessionNotFound)),
        ] {
            let (status, body) = error_response(err.into()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], INVALID_TOKEN_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_store_outage_is_not_reported_as_bad_credentials() {
        let err = AuthError::InvalidSession(Box::new(AuthError::Store(StoreError::Timeout)));
        let (status, body) = error_response(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn test_from_user_error() {
        assert!(matches!(
            AppError::from(UserError::EmailTaken),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(UserError::Store(StoreError::Timeout)),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_from_redis_error() {
        let redis_err = redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "test context",
            "connection refused".to_string(),
        ));
        let app_err = AppError::from(StoreError::from(redis_err));
        match app_err {
            AppError::Internal(msg) => assert!(msg.contains("Redis error")),
            _ => panic!("Expected Internal variant"),
        }
    }
}
