//! Refresh-session bookkeeping on top of [`KvStore`].
//!
//! Key patterns:
//! - `refresh_token:{user_id}:{session_id}`: the active refresh token (STRING, TTL)
//! - `user_sessions:{user_id}`: session ids of the user (SET, TTL >= longest member)
//!
//! A record may briefly exist without an index entry, never the reverse:
//! when the index cannot be updated the record is deleted again. The
//! opposite asymmetry (indexed id whose record already expired) is tolerated
//! because validation always reads the record itself.
//!
//! Every operation takes a deadline. A store call that outlives it yields
//! [`StoreError::Timeout`] and no cleanup is attempted past that point.

use super::{BatchOp, KvStore, StoreError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub fn record_key(user_id: &str, session_id: &str) -> String {
    format!("refresh_token:{}:{}", user_id, session_id)
}

pub fn index_key(user_id: &str) -> String {
    format!("user_sessions:{}", user_id)
}

/// Run a store call, failing with [`StoreError::Timeout`] at `deadline`.
async fn within<T, F>(deadline: Instant, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout_at(deadline, op)
        .await
        .map_err(|_| StoreError::Timeout)?
}

#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn KvStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Persist a session record and index it under its user.
    ///
    /// Runs as one transaction when the backend supports it. Otherwise the
    /// record is written first and removed again if indexing fails.
    pub async fn record(
        &self,
        user_id: &str,
        session_id: &str,
        token: &str,
        ttl: Duration,
        deadline: Instant,
    ) -> Result<(), StoreError> {
        let record_key = record_key(user_id, session_id);
        let index_key = index_key(user_id);
        let ttl_secs = ttl.as_secs().max(1);

        if self.store.atomic_batches() {
            let ops = [
                BatchOp::SetEx {
                    key: record_key,
                    value: token.to_string(),
                    ttl_secs,
                },
                BatchOp::SAdd {
                    key: index_key.clone(),
                    member: session_id.to_string(),
                },
                BatchOp::ExpireAtLeast {
                    key: index_key,
                    ttl_secs,
                },
            ];
            return within(deadline, self.store.exec_batch(&ops)).await;
        }

        within(deadline, self.store.set_ex(&record_key, token, ttl_secs)).await?;

        let indexed = within(deadline, async {
            self.store.sadd(&index_key, session_id).await?;
            self.store.expire_at_least(&index_key, ttl_secs).await
        })
        .await;

        match indexed {
            Ok(()) => Ok(()),
            Err(StoreError::Timeout) => {
                tracing::warn!(
                    action = "session_index_timeout",
                    user_id = %user_id,
                    session_id = %session_id,
                    "Deadline passed while indexing session; record left in place"
                );
                Err(StoreError::Timeout)
            }
            Err(err) => {
                if let Err(cleanup) = within(deadline, self.store.del(&record_key)).await {
                    tracing::error!(
                        action = "session_cleanup_failed",
                        user_id = %user_id,
                        session_id = %session_id,
                        error = %cleanup,
                        "Failed to delete unindexed session record"
                    );
                }
                Err(err)
            }
        }
    }

    /// Read the stored refresh token. Does not consult the index.
    pub async fn lookup(
        &self,
        user_id: &str,
        session_id: &str,
        deadline: Instant,
    ) -> Result<Option<String>, StoreError> {
        within(deadline, self.store.get(&record_key(user_id, session_id))).await
    }

    /// Delete a session record, then drop it from the index.
    ///
    /// Index cleanup is best-effort: once the record is gone the session is
    /// revoked. Returns true if a record existed.
    pub async fn revoke(
        &self,
        user_id: &str,
        session_id: &str,
        deadline: Instant,
    ) -> Result<bool, StoreError> {
        let existed = within(deadline, self.store.del(&record_key(user_id, session_id))).await?;
        self.unindex(user_id, session_id, deadline).await;
        Ok(existed)
    }

    /// Delete a session record only if it still holds `expected`.
    ///
    /// Of several callers racing on the same token exactly one gets true.
    pub async fn take(
        &self,
        user_id: &str,
        session_id: &str,
        expected: &str,
        deadline: Instant,
    ) -> Result<bool, StoreError> {
        let key = record_key(user_id, session_id);
        let taken = within(deadline, self.store.del_if_eq(&key, expected)).await?;
        if taken {
            self.unindex(user_id, session_id, deadline).await;
        }
        Ok(taken)
    }

    /// Delete every session of a user.
    ///
    /// Individual record deletions are best-effort; only reading or deleting
    /// the index itself fails the call. Returns the number of records removed.
    pub async fn revoke_all(&self, user_id: &str, deadline: Instant) -> Result<usize, StoreError> {
        let index_key = index_key(user_id);
        let session_ids = within(deadline, self.store.smembers(&index_key)).await?;

        let mut removed = 0;
        for session_id in &session_ids {
            match within(deadline, self.store.del(&record_key(user_id, session_id))).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        action = "session_revoke_failed",
                        user_id = %user_id,
                        session_id = %session_id,
                        error = %e,
                        "Failed to delete session record during revoke-all"
                    );
                }
            }
        }

        within(deadline, self.store.del(&index_key)).await?;

        Ok(removed)
    }

    /// List indexed sessions that still have a record.
    ///
    /// Index members whose record has expired are pruned on the way.
    pub async fn live_sessions(
        &self,
        user_id: &str,
        deadline: Instant,
    ) -> Result<Vec<String>, StoreError> {
        let session_ids = within(deadline, self.store.smembers(&index_key(user_id))).await?;

        let mut live = Vec::with_capacity(session_ids.len());
        for session_id in session_ids {
            let key = record_key(user_id, &session_id);
            if within(deadline, self.store.exists(&key)).await? {
                live.push(session_id);
            } else {
                self.unindex(user_id, &session_id, deadline).await;
            }
        }

        live.sort();
        Ok(live)
    }

    async fn unindex(&self, user_id: &str, session_id: &str, deadline: Instant) {
        if let Err(e) = within(deadline, self.store.srem(&index_key(user_id), session_id)).await {
            tracing::warn!(
                action = "session_unindex_failed",
                user_id = %user_id,
                session_id = %session_id,
                error = %e,
                "Failed to remove session from user index"
            );
        }
    }
}
