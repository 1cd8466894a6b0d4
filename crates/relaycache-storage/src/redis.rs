//! Redis backend over a `deadpool-redis` connection pool.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use relaycache_core::RedisConfig;

use crate::error::{BackendError, BackendResult};
use crate::redact_url;
use crate::traits::{CacheReader, CacheWriter};

/// Redis-backed cache.
///
/// Values are stored as raw bytes. Expiration uses millisecond precision
/// (`SET ... PX`), and a zero TTL stores the key without expiry.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
    timeout: Duration,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("pool", &self.pool.status())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisBackend {
    /// Creates the pool and checks that the server answers.
    pub async fn connect(config: &RedisConfig) -> BackendResult<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let mut redis_config = Config::from_url(&config.url);
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| BackendError::connection(format!("Failed to create Redis pool: {e}")))?;

        let backend = Self::from_pool(pool, timeout);
        backend.ping().await?;

        tracing::info!(url = %redact_url(&config.url), "Connected to Redis");
        Ok(backend)
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: Pool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub async fn ping(&self) -> BackendResult<()> {
        let mut conn = self.conn().await?;
        self.run("PING", redis::cmd("PING").query_async::<String>(&mut conn))
            .await
            .map(|_| ())
    }

    /// Increments the counter stored at `key` and returns the new value.
    pub async fn incr(&self, key: &str) -> BackendResult<i64> {
        let mut conn = self.conn().await?;
        self.run("INCR", conn.incr::<_, _, i64>(key, 1)).await
    }

    /// Sets a timeout on `key`. Returns `false` when the key does not exist.
    pub async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool> {
        let mut conn = self.conn().await?;
        let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.run("PEXPIRE", conn.pexpire::<_, bool>(key, millis)).await
    }

    async fn conn(&self) -> BackendResult<Connection> {
        Ok(self.pool.get().await?)
    }

    async fn run<T, F>(&self, operation: &str, fut: F) -> BackendResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(BackendError::timeout(format!("redis {operation}"))),
        }
    }
}

#[async_trait]
impl CacheReader for RedisBackend {
    fn name(&self) -> &str {
        "Redis"
    }

    async fn read(&self, key: &str) -> BackendResult<Vec<u8>> {
        let mut conn = self.conn().await?;
        let value = self
            .run("GET", conn.get::<_, Option<Vec<u8>>>(key))
            .await?;

        match value {
            Some(data) => {
                tracing::debug!(key = %key, "cache hit (redis)");
                Ok(data)
            }
            None => {
                tracing::debug!(key = %key, "cache miss (redis)");
                Err(BackendError::miss(key))
            }
        }
    }

    async fn read_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.conn().await?;
        // Explicit MGET: a single-key slice would otherwise be sent as GET
        let values = self
            .run(
                "MGET",
                redis::cmd("MGET")
                    .arg(keys)
                    .query_async::<Vec<Option<Vec<u8>>>>(&mut conn),
            )
            .await?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|data| (key.clone(), data)))
            .collect())
    }
}

#[async_trait]
impl CacheWriter for RedisBackend {
    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()> {
        let mut conn = self.conn().await?;
        if ttl.is_zero() {
            self.run("SET", conn.set::<_, _, ()>(key, value)).await?;
        } else {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            self.run("SET PX", conn.pset_ex::<_, _, ()>(key, value, millis))
                .await?;
        }

        tracing::debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache set (redis)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        let mut conn = self.conn().await?;
        let removed = self.run("DEL", conn.del::<_, i64>(key)).await?;

        if removed == 0 {
            return Err(BackendError::miss(key));
        }
        tracing::debug!(key = %key, "cache del (redis)");
        Ok(())
    }
}
