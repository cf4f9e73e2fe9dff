//! Typed JWT claim shapes.
//!
//! Access and refresh tokens are signed with the same key, so each payload
//! carries a `typ` tag and the verifier always states which shape it expects.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Which kind of token a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// A payload shape that can be signed into a token.
pub trait ClaimShape: Serialize + DeserializeOwned + Clone + Send + Sync {
    const KIND: TokenKind;

    /// The `sub` claim.
    fn subject(&self) -> &str;
}

/// Registered claims plus a typed payload, flattened into one JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims<S> {
    pub typ: TokenKind,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
    #[serde(flatten)]
    pub shape: S,
}

impl<S: ClaimShape> Claims<S> {
    pub fn subject(&self) -> &str {
        self.shape.subject()
    }
}

/// Identity carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessIdentity {
    pub sub: String,
    pub email: String,
    pub username: String,
}

impl ClaimShape for AccessIdentity {
    const KIND: TokenKind = TokenKind::Access;

    fn subject(&self) -> &str {
        &self.sub
    }
}

/// Session binding carried by a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBinding {
    pub sub: String,
    pub sid: String,
}

impl ClaimShape for SessionBinding {
    const KIND: TokenKind = TokenKind::Refresh;

    fn subject(&self) -> &str {
        &self.sub
    }
}

pub type AccessClaims = Claims<AccessIdentity>;
pub type RefreshClaims = Claims<SessionBinding>;

impl AccessClaims {
    pub fn user_id(&self) -> &str {
        &self.shape.sub
    }

    pub fn email(&self) -> &str {
        &self.shape.email
    }

    pub fn username(&self) -> &str {
        &self.shape.username
    }
}

impl RefreshClaims {
    pub fn user_id(&self) -> &str {
        &self.shape.sub
    }

    pub fn session_id(&self) -> &str {
        &self.shape.sid
    }
}
