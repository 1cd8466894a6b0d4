//! Backend selection from configuration.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use relaycache_core::{BackendConfig, BackendKind};

use crate::error::BackendResult;
use crate::memcached::MemcachedBackend;
use crate::memory::MemoryBackend;
use crate::redis::RedisBackend;
use crate::traits::{CacheReader, CacheWriter};

/// Backend chosen at startup.
///
/// Enum dispatch keeps the engine generic over one concrete type while the
/// kind is picked from configuration.
#[derive(Clone, Debug)]
pub enum Backend {
    Memory(MemoryBackend),
    Redis(RedisBackend),
    Memcached(MemcachedBackend),
}

impl Backend {
    /// Connects the configured backend, failing when it cannot be reached.
    pub async fn try_connect(config: &BackendConfig) -> BackendResult<Self> {
        match config.kind {
            BackendKind::Memory => {
                tracing::info!("Using in-memory cache backend");
                Ok(Backend::Memory(MemoryBackend::new()))
            }
            BackendKind::Redis => Ok(Backend::Redis(RedisBackend::connect(&config.redis).await?)),
            BackendKind::Memcached => Ok(Backend::Memcached(
                MemcachedBackend::connect(&config.memcached).await?,
            )),
        }
    }

    /// Connects the configured backend.
    ///
    /// Falls back to an in-memory backend when Redis or Memcached cannot be
    /// reached, so a cache outage at startup never prevents serving from the
    /// remote origin. Writers that must persist should use
    /// [`Backend::try_connect`] instead.
    pub async fn connect(config: &BackendConfig) -> Self {
        match Self::try_connect(config).await {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(
                    kind = ?config.kind,
                    error = %e,
                    "Failed to connect to cache backend. Falling back to in-memory cache."
                );
                Backend::Memory(MemoryBackend::new())
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Memory(_) => BackendKind::Memory,
            Backend::Redis(_) => BackendKind::Redis,
            Backend::Memcached(_) => BackendKind::Memcached,
        }
    }
}

#[async_trait]
impl CacheReader for Backend {
    fn name(&self) -> &str {
        match self {
            Backend::Memory(b) => b.name(),
            Backend::Redis(b) => b.name(),
            Backend::Memcached(b) => b.name(),
        }
    }

    async fn read(&self, key: &str) -> BackendResult<Vec<u8>> {
        match self {
            Backend::Memory(b) => b.read(key).await,
            Backend::Redis(b) => b.read(key).await,
            Backend::Memcached(b) => b.read(key).await,
        }
    }

    async fn read_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        match self {
            Backend::Memory(b) => b.read_multi(keys).await,
            Backend::Redis(b) => b.read_multi(keys).await,
            Backend::Memcached(b) => b.read_multi(keys).await,
        }
    }
}

#[async_trait]
impl CacheWriter for Backend {
    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()> {
        match self {
            Backend::Memory(b) => b.write(key, value, ttl).await,
            Backend::Redis(b) => b.write(key, value, ttl).await,
            Backend::Memcached(b) => b.write(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        match self {
            Backend::Memory(b) => b.delete(key).await,
            Backend::Redis(b) => b.delete(key).await,
            Backend::Memcached(b) => b.delete(key).await,
        }
    }
}

impl From<MemoryBackend> for Backend {
    fn from(backend: MemoryBackend) -> Self {
        Backend::Memory(backend)
    }
}
