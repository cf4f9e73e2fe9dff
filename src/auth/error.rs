//! Authentication error taxonomy.
//!
//! Codec and store errors reach the session manager unchanged. Handlers only
//! see [`AuthFailure`]: every validation failure collapses to
//! `Unauthenticated`, infrastructure trouble to `Internal`. The precise
//! variant is kept for logs.

use crate::storage::StoreError;

/// Token decoding and signing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    MalformedToken,

    #[error("unexpected signing algorithm")]
    UnexpectedAlgorithm,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("token is of the wrong kind")]
    WrongTokenKind,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::UnexpectedAlgorithm
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            _ => TokenError::MalformedToken,
        }
    }
}

/// Outward classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Unauthenticated,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("session not found")]
    SessionNotFound,

    #[error("stored session token does not match presented token")]
    SessionMismatch,

    #[error("failed to persist session: {0}")]
    SessionPersistenceFailed(#[source] StoreError),

    #[error("invalid session: {0}")]
    InvalidSession(#[source] Box<AuthError>),

    #[error("session rotation failed: {0}")]
    RotationFailed(#[source] Box<AuthError>),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Whether the client presented bad credentials or the server failed.
    ///
    /// Wrapped causes are classified recursively, so a store outage during
    /// validation is reported as `Internal`.
    pub fn class(&self) -> AuthFailure {
        match self {
            AuthError::Token(TokenError::Signing(_)) => AuthFailure::Internal,
            AuthError::Token(_) | AuthError::SessionNotFound | AuthError::SessionMismatch => {
                AuthFailure::Unauthenticated
            }
            AuthError::InvalidSession(inner) => inner.class(),
            AuthError::SessionPersistenceFailed(_)
            | AuthError::RotationFailed(_)
            | AuthError::Store(_) => AuthFailure::Internal,
        }
    }

    /// True if a store deadline passed somewhere in the chain.
    ///
    /// Session validity is unknown after a timeout on issue.
    pub fn is_timeout(&self) -> bool {
        match self {
            AuthError::Store(StoreError::Timeout)
            | AuthError::SessionPersistenceFailed(StoreError::Timeout) => true,
            AuthError::InvalidSession(inner) | AuthError::RotationFailed(inner) => {
                inner.is_timeout()
            }
            _ => false,
        }
    }
}
