use crate::auth::SessionSettings;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use zeroize::Zeroizing;

/// Signing key used only when `ALLOW_INSECURE_DEFAULT_SECRET=true`.
const INSECURE_DEFAULT_SECRET: &str = "ballotbox-insecure-development-secret-do-not-deploy";

/// Shortest accepted HS256 secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted token lifetime: one year.
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Longest accepted store deadline: one minute.
pub const MAX_STORE_TIMEOUT_MS: u64 = 60_000;

#[derive(Clone)]
pub struct Config {
    // Redis
    pub redis_url: String,

    // Server
    pub bind_addr: SocketAddr,

    // Token signing
    pub jwt_secret: Zeroizing<String>,

    // Lifetimes (in seconds)
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,

    // Store deadline per operation (in milliseconds)
    pub store_timeout_ms: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"[REDACTED]")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        // Redis is required to prevent silent unauthenticated connections
        let redis_url =
            env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        let jwt_secret = load_secret()?;

        // Lifetimes
        let access_token_ttl_secs = parse_env_or_default("ACCESS_TOKEN_TTL_SECS", 900)?;
        let refresh_token_ttl_secs = parse_env_or_default("REFRESH_TOKEN_TTL_SECS", 604_800)?;
        let store_timeout_ms = parse_env_or_default("STORE_TIMEOUT_MS", 2_000)?;

        for (key, value, max) in [
            ("ACCESS_TOKEN_TTL_SECS", access_token_ttl_secs, MAX_TTL_SECS),
            ("REFRESH_TOKEN_TTL_SECS", refresh_token_ttl_secs, MAX_TTL_SECS),
            ("STORE_TIMEOUT_MS", store_timeout_ms, MAX_STORE_TIMEOUT_MS),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(
                    key.to_string(),
                    "must be greater than zero".to_string(),
                ));
            }
            if value > max {
                return Err(ConfigError::InvalidValue(
                    key.to_string(),
                    format!("must be at most {}", max),
                ));
            }
        }

        if access_token_ttl_secs >= refresh_token_ttl_secs {
            return Err(ConfigError::InvalidValue(
                "ACCESS_TOKEN_TTL_SECS".to_string(),
                "must be shorter than REFRESH_TOKEN_TTL_SECS".to_string(),
            ));
        }

        Ok(Config {
            redis_url,
            bind_addr,
            jwt_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            store_timeout_ms,
        })
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            access_ttl: Duration::from_secs(self.access_token_ttl_secs),
            refresh_ttl: Duration::from_secs(self.refresh_token_ttl_secs),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }
}

/// Read the signing secret, failing closed when it is absent.
///
/// The hardcoded development secret is only used on explicit opt-in.
fn load_secret() -> Result<Zeroizing<String>, ConfigError> {
    match env::var("JWT_SECRET_KEY") {
        Ok(secret) if !secret.is_empty() => {
            let secret = Zeroizing::new(secret);
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConfigError::InvalidValue(
                    "JWT_SECRET_KEY".to_string(),
                    format!("must be at least {} bytes", MIN_SECRET_LEN),
                ));
            }
            Ok(secret)
        }
        _ => {
            let allow_insecure: bool = parse_env_or_default("ALLOW_INSECURE_DEFAULT_SECRET", false)?;
            if !allow_insecure {
                return Err(ConfigError::MissingVar("JWT_SECRET_KEY".to_string()));
            }
            tracing::warn!(
                action = "insecure_default_secret",
                "JWT_SECRET_KEY not set; signing tokens with the insecure development secret"
            );
            Ok(Zeroizing::new(INSECURE_DEFAULT_SECRET.to_string()))
        }
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}
