//! Redis backend for [`KvStore`].
//!
//! Uses a [`ConnectionManager`], a multiplexed connection that reconnects on
//! failure. It is cheap to clone, so every operation clones the handle
//! instead of holding a lock.
//!
//! Compare-and-delete and TTL extension run as Lua scripts so each is a
//! single atomic step on the server. Batches run inside MULTI/EXEC.

use super::{BatchOp, KvStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Deletes KEYS[1] only if it holds ARGV[1].
const DEL_IF_EQ_LUA: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// Raises the TTL of KEYS[1] to ARGV[1] seconds unless it already lives longer.
/// TTL returns -1 for keys without expiry and -2 for missing keys.
const EXPIRE_AT_LEAST_LUA: &str = r"
local wanted = tonumber(ARGV[1])
if redis.call('TTL', KEYS[1]) < wanted then
    redis.call('EXPIRE', KEYS[1], wanted)
end
return 1
";

#[derive(Clone)]
pub struct RedisStore {
    con: ConnectionManager,
}

impl RedisStore {
    /// Open a managed connection to the server behind `client`.
    pub async fn connect(client: redis::Client) -> Result<Self, StoreError> {
        let con = ConnectionManager::new(client).await?;
        Ok(Self { con })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.con.clone();
        Ok(con.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut con = self.con.clone();
        con.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut con = self.con.clone();
        con.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut con = self.con.clone();
        Ok(con.set_nx(key, value).await?)
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.con.clone();
        let deleted: i64 = con.del(key).await?;
        Ok(deleted > 0)
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut con = self.con.clone();
        let deleted: i64 = redis::Script::new(DEL_IF_EQ_LUA)
            .key(key)
            .arg(expected)
            .invoke_async(&mut con)
            .await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.con.clone();
        Ok(con.exists(key).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut con = self.con.clone();
        con.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut con = self.con.clone();
        con.srem::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.con.clone();
        Ok(con.smembers(key).await?)
    }

    async fn expire_at_least(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut con = self.con.clone();
        let _: i64 = redis::Script::new(EXPIRE_AT_LEAST_LUA)
            .key(key)
            .arg(ttl_secs)
            .invoke_async(&mut con)
            .await?;
        Ok(())
    }

    fn atomic_batches(&self) -> bool {
        true
    }

    async fn exec_batch(&self, ops: &[BatchOp]) -> Result<(), StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in ops {
            match op {
                BatchOp::SetEx {
                    key,
                    value,
                    ttl_secs,
                } => {
                    pipe.set_ex(key, value, *ttl_secs).ignore();
                }
                BatchOp::SAdd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
                // EVAL (not EVALSHA) so the script never misses the cache inside MULTI
                BatchOp::ExpireAtLeast { key, ttl_secs } => {
                    pipe.cmd("EVAL")
                        .arg(EXPIRE_AT_LEAST_LUA)
                        .arg(1)
                        .arg(key)
                        .arg(*ttl_secs)
                        .ignore();
                }
            }
        }

        let mut con = self.con.clone();
        let _: () = pipe.query_async(&mut con).await?;
        Ok(())
    }
}
