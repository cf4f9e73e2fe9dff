//! Session identifier generation.

use rand::Rng;

/// Number of random bytes in a session id (128 bits).
pub const SESSION_ID_BYTES: usize = 16;

/// Generate a cryptographically random session id.
///
/// Returns a lowercase hex string (32 characters) from 16 random bytes.
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}
