//! Key-value storage layer for sessions and users.
//!
//! All session bookkeeping goes through the [`KvStore`] trait, a thin
//! async wrapper over a networked key-value store with per-key TTLs.
//! Two backends are provided:
//! - [`redis_store::RedisStore`] for production
//! - [`memory::MemoryStore`] for tests and local development
//!
//! Backends guarantee single-key atomicity only. Multi-key atomicity is
//! available through [`KvStore::exec_batch`] when
//! [`KvStore::atomic_batches`] returns true.

pub mod memory;
pub mod redis_store;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod user;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use session::SessionRegistry;
pub use user::{KvUserDirectory, UserDirectory, UserError};

/// Errors surfaced by a key-value backend.
///
/// These are infrastructure failures and must never be reported to clients
/// as invalid credentials.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out")]
    Timeout,

    #[error("corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(format!("Redis error: {}", err))
    }
}

/// A single write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    SetEx {
        key: String,
        value: String,
        ttl_secs: u64,
    },
    SAdd {
        key: String,
        member: String,
    },
    ExpireAtLeast {
        key: String,
        ttl_secs: u64,
    },
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a value without TTL.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Store a value only if the key is absent. Returns true if written.
    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Returns true if the key existed.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete `key` only if its current value equals `expected`.
    ///
    /// Returns true if the key was deleted. Atomic on every backend.
    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Extend the key's TTL so that it lives at least `ttl_secs` more seconds.
    /// A longer remaining TTL is left untouched.
    async fn expire_at_least(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Whether [`KvStore::exec_batch`] applies all ops as one transaction.
    fn atomic_batches(&self) -> bool;

    async fn exec_batch(&self, ops: &[BatchOp]) -> Result<(), StoreError>;
}
