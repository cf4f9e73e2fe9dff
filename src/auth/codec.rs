//! HS256 token codec.
//!
//! Issues and verifies compact JWTs for any [`ClaimShape`]. Verification
//! pins the algorithm to HS256, requires `exp`/`nbf`/`iat`/`sub`, applies no
//! clock leeway, and rejects tokens whose `typ` tag is not the expected kind.

use super::claims::{ClaimShape, Claims, TokenKind};
use super::error::TokenError;
use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use std::time::Duration;

const ALGORITHM: Algorithm = Algorithm::HS256;

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign `shape` into a token valid from now for `lifetime`.
    pub fn issue<S: ClaimShape>(&self, shape: S, lifetime: Duration) -> Result<String, TokenError> {
        let now = get_current_timestamp();
        let exp = now
            .checked_add(lifetime.as_secs())
            .ok_or_else(|| TokenError::Signing("token lifetime out of range".to_string()))?;
        let claims = Claims {
            typ: S::KIND,
            iat: now,
            nbf: now,
            exp,
            shape,
        };
        self.sign(&claims)
    }

    /// Sign fully specified claims. Timestamps are taken as given.
    pub(crate) fn sign<S: ClaimShape>(&self, claims: &Claims<S>) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and decode it as shape `S`.
    ///
    /// Signature and time checks run first; the kind tag is compared before
    /// the payload is decoded so a token of the other kind is reported as
    /// [`TokenError::WrongTokenKind`] rather than as malformed.
    pub fn verify<S: ClaimShape>(&self, token: &str) -> Result<Claims<S>, TokenError> {
        let data = decode::<serde_json::Value>(token, &self.decoding_key, &self.validation)?;

        let kind = data
            .claims
            .get("typ")
            .cloned()
            .ok_or(TokenError::MalformedToken)
            .and_then(|typ| {
                serde_json::from_value::<TokenKind>(typ).map_err(|_| TokenError::MalformedToken)
            })?;
        if kind != S::KIND {
            return Err(TokenError::WrongTokenKind);
        }

        let claims: Claims<S> =
            serde_json::from_value(data.claims).map_err(|_| TokenError::MalformedToken)?;
        if claims.subject().is_empty() {
            return Err(TokenError::MalformedToken);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::{AccessClaims, AccessIdentity, RefreshClaims, SessionBinding};

    const SECRET: &[u8] = b"test-secret-key-that-is-long-enough-for-hs256";

    fn identity() -> AccessIdentity {
        AccessIdentity {
            sub: "user-123".to_string(),
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
        }
    }

    fn binding() -> SessionBinding {
        SessionBinding {
            sub: "user-123".to_string(),
            sid: "0123456789abcdef0123456789abcdef".to_string(),
        }
    }

    fn claims_at<S: ClaimShape>(shape: S, nbf: u64, exp: u64) -> Claims<S> {
        Claims {
            typ: S::KIND,
            iat: nbf,
            nbf,
            exp,
            shape,
        }
    }

    #[test]
    fn test_issue_and_verify_access() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.issue(identity(), Duration::from_secs(900)).unwrap();

        let claims: AccessClaims = codec.verify(&token).unwrap();
        assert_eq!(claims.shape, identity());
        assert_eq!(claims.typ, TokenKind::Access);
        assert_eq!(claims.iat, claims.nbf);
        assert_eq!(claims.exp, claims.iat + 900);
    }

    #[test]
    fn test_issue_and_verify_refresh() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.issue(binding(), Duration::from_secs(3600)).unwrap();

        let claims: RefreshClaims = codec.verify(&token).unwrap();
        assert_eq!(claims.user_id(), "user-123");
        assert_eq!(claims.session_id(), binding().sid);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.issue(binding(), Duration::from_secs(3600)).unwrap();

        let result = codec.verify::<AccessIdentity>(&token);
        assert_eq!(result.unwrap_err(), TokenError::WrongTokenKind);
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.issue(identity(), Duration::from_secs(900)).unwrap();

        let result = codec.verify::<SessionBinding>(&token);
        assert_eq!(result.unwrap_err(), TokenError::WrongTokenKind);
    }

    #[test]
    fn test_unrepresentable_lifetime_is_an_error() {
        let codec = TokenCodec::new(SECRET);
        let result = codec.issue(identity(), Duration::from_secs(u64::MAX));
        assert!(matches!(result, Err(TokenError::Signing(_))));

        // Largest lifetime that still fits
        let headroom = u64::MAX - get_current_timestamp() - 60;
        assert!(codec.issue(identity(), Duration::from_secs(headroom)).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let codec = TokenCodec::new(SECRET);
        let now = get_current_timestamp();
        let token = codec.sign(&claims_at(identity(), now - 1000, now - 10)).unwrap();

        let result = codec.verify::<AccessIdentity>(&token);
        assert_eq!(result.unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_not_yet_valid_token() {
        let codec = TokenCodec::new(SECRET);
        let now = get_current_timestamp();
        let token = codec
            .sign(&claims_at(identity(), now + 3600, now + 7200))
            .unwrap();

        let result = codec.verify::<AccessIdentity>(&token);
        assert_eq!(result.unwrap_err(), TokenError::NotYetValid);
    }

    #[test]
    fn test_wrong_secret() {
        let codec = TokenCodec::new(SECRET);
        let other = TokenCodec::new(b"a-completely-different-secret-key-value");
        let token = other.issue(identity(), Duration::from_secs(900)).unwrap();

        let result = codec.verify::<AccessIdentity>(&token);
        assert_eq!(result.unwrap_err(), TokenError::SignatureInvalid);
    }

    #[test]
    fn test_tampered_payload() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.issue(identity(), Duration::from_secs(900)).unwrap();
        let other = codec
            .issue(
                AccessIdentity {
                    sub: "admin".to_string(),
                    ..identity()
                },
                Duration::from_secs(900),
            )
            .unwrap();

        // Splice the other token's payload under the original signature
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        let result = codec.verify::<AccessIdentity>(&forged);
        assert_eq!(result.unwrap_err(), TokenError::SignatureInvalid);
    }

    #[test]
    fn test_unexpected_algorithm() {
        let codec = TokenCodec::new(SECRET);
        let now = get_current_timestamp();
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims_at(identity(), now, now + 900),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let result = codec.verify::<AccessIdentity>(&token);
        assert_eq!(result.unwrap_err(), TokenError::UnexpectedAlgorithm);
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = TokenCodec::new(SECRET);
        for token in ["", "not-a-jwt", "a.b.c", "a.b"] {
            let result = codec.verify::<AccessIdentity>(token);
            assert_eq!(result.unwrap_err(), TokenError::MalformedToken, "{:?}", token);
        }
    }

    #[test]
    fn test_missing_kind_tag_is_malformed() {
        #[derive(serde::Serialize)]
        struct Untagged {
            sub: String,
            iat: u64,
            nbf: u64,
            exp: u64,
        }

        let codec = TokenCodec::new(SECRET);
        let now = get_current_timestamp();
        let token = encode(
            &Header::new(ALGORITHM),
            &Untagged {
                sub: "user-123".to_string(),
                iat: now,
                nbf: now,
                exp: now + 900,
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let result = codec.verify::<AccessIdentity>(&token);
        assert_eq!(result.unwrap_err(), TokenError::MalformedToken);
    }
}
