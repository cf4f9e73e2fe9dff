//! Axum extractors for authentication.

use super::claims::AccessClaims;
use super::manager::SessionManager;
use crate::error::AppError;
use crate::storage::UserDirectory;
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub users: Arc<dyn UserDirectory>,
}

/// Authenticated caller extractor.
///
/// Extracts an access token from `Authorization: Bearer {token}` header.
/// Returns 401 Unauthorized if missing or invalid. Never touches the store.
pub struct AuthUser {
    claims: AccessClaims,
}

impl AuthUser {
    pub fn user_id(&self) -> &str {
        self.claims.user_id()
    }

    pub fn email(&self) -> &str {
        self.claims.email()
    }

    pub fn username(&self) -> &str {
        self.claims.username()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Extract Authorization header
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

        // Parse Bearer token
        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))?;

        let claims = state.sessions.validate_access(token)?;

        Ok(AuthUser { claims })
    }
}
