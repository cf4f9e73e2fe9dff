//! Token lifecycle orchestration.
//!
//! Per session: `ISSUED -> (validated)* -> ROTATED | REVOKED | EXPIRED`.
//! Rotated and revoked session ids are never reused; an expired record looks
//! exactly like a revoked one (`SessionNotFound`).
//!
//! Access tokens are stateless and cannot be revoked before they expire.
//! Refresh tokens are live only while their record exists in the store.
//!
//! The manager holds no mutable state. All coordination happens in the
//! store, which is trusted for single-key atomicity only. A rotation racing
//! a revoke-all for the same user may leave the rotated session alive.

use super::claims::{AccessClaims, AccessIdentity, RefreshClaims, SessionBinding};
use super::codec::TokenCodec;
use super::error::AuthError;
use super::session::generate_session_id;
use crate::storage::{KvStore, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use zeroize::Zeroizing;

pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadline used when `store_timeout` does not fit on the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Token lifetimes and the store deadline applied to each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub store_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// A freshly issued refresh session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub refresh_token: String,
    pub session_id: String,
}

/// Result of a successful rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedSession {
    pub refresh_token: String,
    pub session_id: String,
    pub user_id: String,
}

pub struct SessionManager {
    codec: TokenCodec,
    registry: SessionRegistry,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(codec: TokenCodec, store: Arc<dyn KvStore>, settings: SessionSettings) -> Self {
        Self {
            codec,
            registry: SessionRegistry::new(store),
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.settings.store_timeout)
            .unwrap_or_else(|| now + FAR_FUTURE)
    }

    /// Mint a short-lived access token. Touches no storage.
    pub fn issue_access(
        &self,
        user_id: &str,
        email: &str,
        username: &str,
    ) -> Result<String, AuthError> {
        let identity = AccessIdentity {
            sub: user_id.to_string(),
            email: email.to_string(),
            username: username.to_string(),
        };
        Ok(self.codec.issue(identity, self.settings.access_ttl)?)
    }

    /// Start a new refresh session for a user.
    ///
    /// The returned token is only valid once its record is persisted; on
    /// `SessionPersistenceFailed` it must be discarded. After a timeout the
    /// session's state is unknown and a fresh session is preferable to a retry.
    pub async fn issue_session(&self, user_id: &str) -> Result<IssuedSession, AuthError> {
        self.issue_session_until(user_id, self.deadline()).await
    }

    async fn issue_session_until(
        &self,
        user_id: &str,
        deadline: Instant,
    ) -> Result<IssuedSession, AuthError> {
        let session_id = generate_session_id();
        let binding = SessionBinding {
            sub: user_id.to_string(),
            sid: session_id.clone(),
        };
        let refresh_token = self.codec.issue(binding, self.settings.refresh_ttl)?;

        self.registry
            .record(
                user_id,
                &session_id,
                &refresh_token,
                self.settings.refresh_ttl,
                deadline,
            )
            .await
            .map_err(AuthError::SessionPersistenceFailed)?;

        tracing::debug!(action = "session_issued", user_id = %user_id, session_id = %session_id, "Refresh session issued");

        Ok(IssuedSession {
            refresh_token,
            session_id,
        })
    }

    /// Verify an access token. No store lookup.
    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        Ok(self.codec.verify::<AccessIdentity>(token)?)
    }

    /// Verify a refresh token and confirm its session is still live.
    pub async fn validate_session(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        self.validate_session_until(token, self.deadline()).await
    }

    async fn validate_session_until(
        &self,
        token: &str,
        deadline: Instant,
    ) -> Result<RefreshClaims, AuthError> {
        let claims = self.codec.verify::<SessionBinding>(token)?;

        let stored = self
            .registry
            .lookup(claims.user_id(), claims.session_id(), deadline)
            .await?
            .map(Zeroizing::new)
            .ok_or(AuthError::SessionNotFound)?;

        if stored.as_str() != token {
            return Err(AuthError::SessionMismatch);
        }

        Ok(claims)
    }

    /// Revoke one session. Idempotent.
    pub async fn revoke_session(&self, user_id: &str, session_id: &str) -> Result<(), AuthError> {
        let existed = self
            .registry
            .revoke(user_id, session_id, self.deadline())
            .await?;
        tracing::info!(action = "session_revoked", user_id = %user_id, session_id = %session_id, existed, "Session revoked");
        Ok(())
    }

    /// Revoke every session of a user ("log out everywhere").
    ///
    /// Outstanding access tokens stay valid until they expire.
    pub async fn revoke_all_sessions(&self, user_id: &str) -> Result<(), AuthError> {
        let removed = self.registry.revoke_all(user_id, self.deadline()).await?;
        tracing::info!(action = "sessions_revoked_all", user_id = %user_id, removed, "All sessions revoked");
        Ok(())
    }

    /// Exchange a refresh token for a new one under a new session id.
    ///
    /// The old session is revoked before the new one is issued so the two are
    /// never valid at the same time. Revocation is a compare-and-delete on the
    /// presented token, so of two concurrent rotations of the same token only
    /// one proceeds. If issuing fails after revocation the user is left
    /// without a session (`RotationFailed`) and must log in again.
    pub async fn rotate_session(&self, old_token: &str) -> Result<RotatedSession, AuthError> {
        let deadline = self.deadline();

        let claims = self
            .validate_session_until(old_token, deadline)
            .await
            .map_err(|e| AuthError::InvalidSession(Box::new(e)))?;
        let user_id = claims.user_id();

        let taken = self
            .registry
            .take(user_id, claims.session_id(), old_token, deadline)
            .await?;
        if !taken {
            tracing::warn!(action = "rotation_lost_race", user_id = %user_id, session_id = %claims.session_id(), "Session already rotated or revoked");
            return Err(AuthError::InvalidSession(Box::new(
                AuthError::SessionNotFound,
            )));
        }

        let issued = self
            .issue_session_until(user_id, deadline)
            .await
            .map_err(|e| {
                tracing::error!(action = "rotation_failed", user_id = %user_id, old_session_id = %claims.session_id(), error = %e, "Old session revoked but new session could not be issued");
                AuthError::RotationFailed(Box::new(e))
            })?;

        tracing::info!(
            action = "session_rotated",
            user_id = %user_id,
            old_session_id = %claims.session_id(),
            session_id = %issued.session_id,
            "Refresh session rotated"
        );

        Ok(RotatedSession {
            refresh_token: issued.refresh_token,
            session_id: issued.session_id,
            user_id: user_id.to_string(),
        })
    }

    /// Live session ids of a user, pruning index entries whose record expired.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<String>, AuthError> {
        Ok(self.registry.live_sessions(user_id, self.deadline()).await?)
    }
}
