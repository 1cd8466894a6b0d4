//! In-process backend on top of `DashMap`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{BackendError, BackendResult};
use crate::traits::{CacheReader, CacheWriter};

/// A stored value with an optional deadline.
#[derive(Clone, Debug)]
struct MemoryEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: (!ttl.is_zero()).then(|| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Map-backed cache, mostly for tests and single-process deployments.
///
/// There is no eviction policy; entries live until they expire or are deleted.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a backend pre-filled with non-expiring entries.
    pub fn with_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        let backend = Self::new();
        for (key, value) in entries {
            backend
                .entries
                .insert(key.into(), MemoryEntry::new(value.into(), Duration::ZERO));
        }
        backend
    }

    /// Number of stored entries, expired ones included until they are touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Some(entry.data.clone());
            }
        } else {
            return None;
        }

        // Expired: drop it so the map does not grow with dead entries
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        None
    }
}

#[async_trait]
impl CacheReader for MemoryBackend {
    fn name(&self) -> &str {
        "Memory"
    }

    async fn read(&self, key: &str) -> BackendResult<Vec<u8>> {
        match self.lookup(key) {
            Some(data) => {
                tracing::debug!(key = %key, "cache hit (memory)");
                Ok(data)
            }
            None => {
                tracing::debug!(key = %key, "cache miss (memory)");
                Err(BackendError::miss(key))
            }
        }
    }

    async fn read_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        Ok(keys
            .iter()
            .filter_map(|key| self.lookup(key).map(|data| (key.clone(), data)))
            .collect())
    }
}

#[async_trait]
impl CacheWriter for MemoryBackend {
    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()> {
        self.entries
            .insert(key.to_string(), MemoryEntry::new(value.to_vec(), ttl));
        tracing::debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache set (memory)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        match self.entries.remove(key) {
            Some((_, entry)) if !entry.is_expired() => Ok(()),
            _ => Err(BackendError::miss(key)),
        }
    }
}
