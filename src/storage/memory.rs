//! In-memory [`KvStore`] for development and testing.
//!
//! Every operation runs under one lock, so single ops and batches are
//! atomic. Expiry uses `tokio::time::Instant`, which lets tests drive TTLs
//! with a paused clock. Expired keys are dropped when touched and swept from
//! the whole map at most once per [`SWEEP_INTERVAL`] on writes.

use super::{BatchOp, KvStore, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Deadline `ttl_secs` from `now`. A TTL past the clock's range never expires.
fn expiry(now: Instant, ttl_secs: u64) -> Option<Instant> {
    now.checked_add(Duration::from_secs(ttl_secs))
}

struct Inner {
    entries: HashMap<String, Entry>,
    last_sweep: Instant,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            last_sweep: Instant::now(),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining TTL of a key, `None` if missing or persistent.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Lock for a write, first sweeping expired keys if a sweep is due.
    async fn lock_for_write(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        if now.saturating_duration_since(inner.last_sweep) >= SWEEP_INTERVAL {
            inner.entries.retain(|_, e| e.is_live(now));
            inner.last_sweep = now;
        }
        inner
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Corrupt {
        key: key.to_string(),
        reason: "operation against a key holding the wrong kind of value".to_string(),
    }
}

/// Drop the entry if it has expired and return what is left.
fn live<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|e| !e.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn apply_set_ex(entries: &mut HashMap<String, Entry>, key: &str, value: &str, ttl_secs: u64) {
    entries.insert(
        key.to_string(),
        Entry {
            value: Value::Str(value.to_string()),
            expires_at: expiry(Instant::now(), ttl_secs),
        },
    );
}

fn apply_sadd(
    entries: &mut HashMap<String, Entry>,
    key: &str,
    member: &str,
) -> Result<(), StoreError> {
    let now = Instant::now();
    match live(entries, key, now) {
        Some(Entry {
            value: Value::Set(members),
            ..
        }) => {
            members.insert(member.to_string());
            Ok(())
        }
        Some(_) => Err(wrong_type(key)),
        None => {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Set(HashSet::from([member.to_string()])),
                    expires_at: None,
                },
            );
            Ok(())
        }
    }
}

fn apply_expire_at_least(entries: &mut HashMap<String, Entry>, key: &str, ttl_secs: u64) {
    let now = Instant::now();
    let wanted = expiry(now, ttl_secs);
    if let Some(entry) = live(entries, key, now) {
        match (entry.expires_at, wanted) {
            (Some(at), Some(wanted)) if at >= wanted => {}
            _ => entry.expires_at = wanted,
        }
    }
}

fn batch_key(op: &BatchOp) -> &str {
    match op {
        BatchOp::SetEx { key, .. }
        | BatchOp::SAdd { key, .. }
        | BatchOp::ExpireAtLeast { key, .. } => key,
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        match live(&mut inner.entries, key, Instant::now()) {
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write().await;
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write().await;
        apply_set_ex(&mut inner.entries, key, value, ttl_secs);
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock_for_write().await;
        if live(&mut inner.entries, key, Instant::now()).is_some() {
            return Ok(false);
        }
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock_for_write().await;
        let existed = live(&mut inner.entries, key, Instant::now()).is_some();
        inner.entries.remove(key);
        Ok(existed)
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock_for_write().await;
        let matches = matches!(
            live(&mut inner.entries, key, Instant::now()),
            Some(Entry { value: Value::Str(s), .. }) if s.as_str() == expected
        );
        if matches {
            inner.entries.remove(key);
        }
        Ok(matches)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(live(&mut inner.entries, key, Instant::now()).is_some())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write().await;
        apply_sadd(&mut inner.entries, key, member)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write().await;
        let emptied = match live(&mut inner.entries, key, Instant::now()) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                members.remove(member);
                members.is_empty()
            }
            Some(_) => return Err(wrong_type(key)),
            None => false,
        };
        // Redis drops empty sets
        if emptied {
            inner.entries.remove(key);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        match live(&mut inner.entries, key, Instant::now()) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn expire_at_least(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write().await;
        apply_expire_at_least(&mut inner.entries, key, ttl_secs);
        Ok(())
    }

    fn atomic_batches(&self) -> bool {
        true
    }

    async fn exec_batch(&self, ops: &[BatchOp]) -> Result<(), StoreError> {
        let mut inner = self.lock_for_write().await;

        // Stage only the touched keys so a failing op leaves nothing behind
        let touched: HashSet<&str> = ops.iter().map(batch_key).collect();
        let mut staged: HashMap<String, Entry> = touched
            .iter()
            .filter_map(|key| {
                inner
                    .entries
                    .get(*key)
                    .map(|entry| (key.to_string(), entry.clone()))
            })
            .collect();

        for op in ops {
            match op {
                BatchOp::SetEx {
                    key,
                    value,
                    ttl_secs,
                } => apply_set_ex(&mut staged, key, value, *ttl_secs),
                BatchOp::SAdd { key, member } => apply_sadd(&mut staged, key, member)?,
                BatchOp::ExpireAtLeast { key, ttl_secs } => {
                    apply_expire_at_least(&mut staged, key, *ttl_secs)
                }
            }
        }

        for key in touched {
            match staged.remove(key) {
                Some(entry) => {
                    inner.entries.insert(key.to_string(), entry);
                }
                None => {
                    inner.entries.remove(key);
                }
            }
        }
        Ok(())
    }
}
