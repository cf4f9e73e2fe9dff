//! Authentication layer: signed tokens, refresh sessions and password hashing.

pub mod claims;
pub mod codec;
pub mod error;
pub mod manager;
pub mod middleware;
pub mod password;
pub mod session;

pub use claims::{AccessClaims, RefreshClaims, TokenKind};
pub use codec::TokenCodec;
pub use error::{AuthError, AuthFailure, TokenError};
pub use manager::{IssuedSession, RotatedSession, SessionManager, SessionSettings};
pub use middleware::{AppState, AuthUser};
pub use password::{hash_password, verify_dummy_password, verify_password, PasswordError};
pub use session::generate_session_id;
