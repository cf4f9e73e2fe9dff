//! Failure-injecting store shared by unit tests.

use super::{BatchOp, KvStore, MemoryStore, StoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Non-transactional store whose writes can be made to fail or hang.
///
/// Record-level flags only affect `refresh_token:` keys so user and index
/// writes keep working.
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    pub(crate) fail_set_ex: AtomicBool,
    pub(crate) fail_del: AtomicBool,
    pub(crate) fail_del_if_eq: AtomicBool,
    pub(crate) fail_sadd: AtomicBool,
    pub(crate) hang_sadd: AtomicBool,
    pub(crate) fail_srem: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn arm(&self, flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }
}

fn is_record(key: &str) -> bool {
    key.starts_with("refresh_token:")
}

fn injected(op: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {} failure", op))
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        if self.fail_set_ex.load(Ordering::SeqCst) && is_record(key) {
            return Err(injected("set_ex"));
        }
        self.inner.set_ex(key, value, ttl_secs).await
    }
    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.inner.set_nx(key, value).await
    }
    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        if self.fail_del.load(Ordering::SeqCst) && is_record(key) {
            return Err(injected("del"));
        }
        self.inner.del(key).await
    }
    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        if self.fail_del_if_eq.load(Ordering::SeqCst) {
            return Err(injected("del_if_eq"));
        }
        self.inner.del_if_eq(key, expected).await
    }
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }
    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if self.hang_sadd.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_sadd.load(Ordering::SeqCst) {
            return Err(injected("sadd"));
        }
        self.inner.sadd(key, member).await
    }
    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if self.fail_srem.load(Ordering::SeqCst) {
            return Err(injected("srem"));
        }
        self.inner.srem(key, member).await
    }
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.inner.smembers(key).await
    }
    async fn expire_at_least(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.inner.expire_at_least(key, ttl_secs).await
    }
    fn atomic_batches(&self) -> bool {
        false
    }
    async fn exec_batch(&self, _ops: &[BatchOp]) -> Result<(), StoreError> {
        unreachable!("registry must not batch on a non-transactional store")
    }
}
