use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use marquee_core::error::StoreError;
use marquee_core::model::LockEntry;
use marquee_core::store::{AcquireReply, LockStore};

const SCAN_PAGE: usize = 100;

/// Redis-backed lock store. Entries are JSON values under TTL'd keys; every
/// conditional operation runs as a Lua script so the holder check and the
/// write happen atomically on the server.
#[derive(Clone)]
pub struct RedisLockStore {
    client: redis::Client,
    op_timeout: Duration,
}

impl RedisLockStore {
    pub fn connect(connection_string: &str, op_timeout: Duration) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, op_timeout })
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = redis::RedisResult<T>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Unavailable(format!(
                "redis call exceeded {}ms",
                self.op_timeout.as_millis()
            ))),
        }
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self
            .bounded(self.client.get_multiplexed_async_connection())
            .await?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = self
                .bounded(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_PAGE)
                        .query_async(&mut conn),
                )
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }
}

fn parse_entry(key: &str, raw: &str) -> Result<LockEntry, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn encode_entry(key: &str, entry: &LockEntry) -> Result<String, StoreError> {
    serde_json::to_string(entry).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(
        &self,
        key: &str,
        entry: &LockEntry,
        ttl_seconds: u64,
    ) -> Result<AcquireReply, StoreError> {
        let payload = encode_entry(key, entry)?;
        let op = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            // Set if absent or already owned by the same holder (TTL reset).
            let script = redis::Script::new(
                r#"
                local cur = redis.call('GET', KEYS[1])
                if cur then
                  local held = cjson.decode(cur)
                  if held.holder_id ~= ARGV[2] then
                    return {2, cur}
                  end
                  redis.call('SET', KEYS[1], ARGV[1], 'EX', tonumber(ARGV[3]))
                  return {1, ''}
                end
                redis.call('SET', KEYS[1], ARGV[1], 'EX', tonumber(ARGV[3]))
                return {0, ''}
            "#,
            );
            let reply: (i64, String) = script
                .key(key)
                .arg(&payload)
                .arg(&entry.holder_id)
                .arg(ttl_seconds)
                .invoke_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>(reply)
        };
        let (code, current) = self.bounded(op).await?;
        match code {
            0 => Ok(AcquireReply::Acquired),
            1 => Ok(AcquireReply::Refreshed),
            2 => Ok(AcquireReply::Held(parse_entry(key, &current)?)),
            other => Err(StoreError::Unavailable(format!(
                "unexpected acquire script reply {}",
                other
            ))),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<LockEntry>, StoreError> {
        let op = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let raw: Option<String> = conn.get(key).await?;
            Ok::<_, redis::RedisError>(raw)
        };
        match self.bounded(op).await? {
            Some(raw) => Ok(Some(parse_entry(key, &raw)?)),
            None => Ok(None),
        }
    }

    async fn refresh_if_holder(
        &self,
        key: &str,
        holder_id: &str,
        expires_at: i64,
        ttl_seconds: u64,
    ) -> Result<bool, StoreError> {
        let op = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let script = redis::Script::new(
                r#"
                local cur = redis.call('GET', KEYS[1])
                if not cur then return 0 end
                local held = cjson.decode(cur)
                if held.holder_id ~= ARGV[1] then return 0 end
                held.expires_at = tonumber(ARGV[2])
                redis.call('SET', KEYS[1], cjson.encode(held), 'EX', tonumber(ARGV[3]))
                return 1
            "#,
            );
            let refreshed: bool = script
                .key(key)
                .arg(holder_id)
                .arg(expires_at)
                .arg(ttl_seconds)
                .invoke_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>(refreshed)
        };
        self.bounded(op).await
    }

    async fn remove_if_holder(&self, key: &str, holder_id: &str) -> Result<bool, StoreError> {
        let op = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let script = redis::Script::new(
                r#"
                local cur = redis.call('GET', KEYS[1])
                if not cur then return 0 end
                local held = cjson.decode(cur)
                if held.holder_id ~= ARGV[1] then return 0 end
                return redis.call('DEL', KEYS[1])
            "#,
            );
            let removed: bool = script
                .key(key)
                .arg(holder_id)
                .invoke_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>(removed)
        };
        self.bounded(op).await
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let op = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let removed: i64 = conn.del(key).await?;
            Ok::<_, redis::RedisError>(removed)
        };
        Ok(self.bounded(op).await? > 0)
    }

    async fn remove_expired(&self, key: &str, now: i64) -> Result<bool, StoreError> {
        let op = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let script = redis::Script::new(
                r#"
                local cur = redis.call('GET', KEYS[1])
                if not cur then return 0 end
                local held = cjson.decode(cur)
                if tonumber(held.expires_at) > tonumber(ARGV[1]) then return 0 end
                return redis.call('DEL', KEYS[1])
            "#,
            );
            let removed: bool = script.key(key).arg(now).invoke_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(removed)
        };
        self.bounded(op).await
    }

    async fn scan_locks(&self, prefix: &str) -> Result<Vec<(String, LockEntry)>, StoreError> {
        let keys = self.scan_keys(&format!("{}*", prefix)).await?;
        let mut conn = self
            .bounded(self.client.get_multiplexed_async_connection())
            .await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = self.bounded(conn.get(&key)).await?;
            // Keys expiring between SCAN and GET are simply gone.
            if let Some(raw) = raw {
                let entry = parse_entry(&key, &raw)?;
                out.push((key, entry));
            }
        }
        Ok(out)
    }

    async fn put_marker(&self, key: &str) -> Result<(), StoreError> {
        let op = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.set::<_, _, ()>(key, 1).await?;
            Ok::<_, redis::RedisError>(())
        };
        self.bounded(op).await
    }

    async fn has_marker(&self, key: &str) -> Result<bool, StoreError> {
        let op = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let exists: bool = conn.exists(key).await?;
            Ok::<_, redis::RedisError>(exists)
        };
        self.bounded(op).await
    }

    async fn remove_marker(&self, key: &str) -> Result<bool, StoreError> {
        let op = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let removed: i64 = conn.del(key).await?;
            Ok::<_, redis::RedisError>(removed)
        };
        Ok(self.bounded(op).await? > 0)
    }

    async fn scan_markers(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.scan_keys(&format!("{}*", prefix)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let op = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(())
        };
        self.bounded(op).await
    }
}
