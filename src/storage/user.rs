//! User records over [`KvStore`].
//!
//! Key patterns:
//! - `user:{nanoid}`: individual user data (JSON, no TTL)
//! - `user_email:{email}`: email lookup to user_id (STRING)
//! - `user_name:{username}`: username claim (STRING)
//!
//! Emails are stored lowercased. Uniqueness rests on `SET NX` of the lookup
//! keys, so two concurrent signups for the same email cannot both win.

use super::{KvStore, StoreError};
use crate::models::StoredUser;
use async_trait::async_trait;
use std::sync::Arc;
use zeroize::Zeroizing;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("email already registered")]
    EmailTaken,

    #[error("username already taken")]
    UsernameTaken,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where users come from. The session core only needs lookups by id.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_by_id(&self, id: &str) -> Result<Option<StoredUser>, UserError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, UserError>;

    async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<StoredUser, UserError>;
}

fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

fn email_key(email: &str) -> String {
    format!("user_email:{}", email.to_lowercase())
}

fn username_key(username: &str) -> String {
    format!("user_name:{}", username)
}

pub struct KvUserDirectory {
    store: Arc<dyn KvStore>,
}

impl KvUserDirectory {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Release a lookup key claimed during a signup that did not complete.
    async fn release(&self, key: &str) {
        if let Err(e) = self.store.del(key).await {
            tracing::warn!(action = "user_claim_release_failed", key = %key, error = %e, "Failed to release user lookup key");
        }
    }
}

#[async_trait]
impl UserDirectory for KvUserDirectory {
    /// The user JSON is zeroized after deserialization.
    async fn get_user_by_id(&self, id: &str) -> Result<Option<StoredUser>, UserError> {
        let key = user_key(id);
        let json = match self.store.get(&key).await? {
            Some(data) => Zeroizing::new(data),
            None => return Ok(None),
        };

        let user = serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
            key,
            reason: e.to_string(),
        })?;
        Ok(Some(user))
    }

    /// Two-step lookup: email -> user_id -> user data.
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, UserError> {
        match self.store.get(&email_key(email)).await? {
            Some(id) => self.get_user_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<StoredUser, UserError> {
        let user = StoredUser {
            id: nanoid::nanoid!(12),
            email: email.to_lowercase(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        };

        let email_key = email_key(&user.email);
        if !self.store.set_nx(&email_key, &user.id).await? {
            return Err(UserError::EmailTaken);
        }

        let username_key = username_key(&user.username);
        match self.store.set_nx(&username_key, &user.id).await {
            Ok(true) => {}
            Ok(false) => {
                self.release(&email_key).await;
                return Err(UserError::UsernameTaken);
            }
            Err(e) => {
                self.release(&email_key).await;
                return Err(e.into());
            }
        }

        let json = Zeroizing::new(serde_json::to_string(&user).map_err(|e| {
            StoreError::Corrupt {
                key: user_key(&user.id),
                reason: e.to_string(),
            }
        })?);

        if let Err(e) = self.store.set(&user_key(&user.id), &json).await {
            self.release(&username_key).await;
            self.release(&email_key).await;
            return Err(e.into());
        }

        tracing::info!(action = "user_created", user_id = %user.id, "User created");

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn directory() -> (KvUserDirectory, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (KvUserDirectory::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let (users, _) = directory();
        let created = users
            .create_user("Alice@Example.com", "alice", "$argon2id$hash")
            .await
            .unwrap();

        assert_eq!(created.id.len(), 12);
        assert_eq!(created.email, "alice@example.com");

        let by_id = users.get_user_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
        assert_eq!(by_id.password_hash, "$argon2id$hash");

        let by_email = users.find_by_email("ALICE@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (users, _) = directory();
        assert!(users.get_user_by_id("nope").await.unwrap().is_none());
        assert!(users.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (users, _) = directory();
        users.create_user("a@example.com", "first", "h").await.unwrap();

        let result = users.create_user("A@example.com", "second", "h").await;
        assert!(matches!(result, Err(UserError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_duplicate_username_releases_email() {
        let (users, _) = directory();
        users.create_user("a@example.com", "taken", "h").await.unwrap();

        let result = users.create_user("b@example.com", "taken", "h").await;
        assert!(matches!(result, Err(UserError::UsernameTaken)));

        // The email claim from the failed signup must be free again
        users.create_user("b@example.com", "other", "h").await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_user_record() {
        let (users, store) = directory();
        store.set("user:broken", "{not json").await.unwrap();

        let result = users.get_user_by_id("broken").await;
        assert!(matches!(
            result,
            Err(UserError::Store(StoreError::Corrupt { .. }))
        ));
    }
}
