//! Backend contract consumed by the cache engine.
//!
//! Reading is the minimum capability. Writing is a separate trait so that an
//! engine over a read-only backend simply has no `write` method, instead of
//! failing at runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendResult;

/// Read side of a cache backend.
///
/// Implementations must be thread-safe (`Send + Sync`); one backend handle is
/// shared by every concurrent call on the engine.
///
/// # Example
///
/// ```ignore
/// use relaycache_storage::{CacheReader, BackendError};
///
/// async fn cached(backend: &dyn CacheReader, key: &str) -> Option<Vec<u8>> {
///     backend.read(key).await.ok()
/// }
/// ```
#[async_trait]
pub trait CacheReader: Send + Sync {
    /// Human-readable backend identifier, used for metric labels.
    fn name(&self) -> &str;

    /// Reads a single key.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Miss` when the key is absent, or another variant
    /// when the backend itself fails.
    async fn read(&self, key: &str) -> BackendResult<Vec<u8>>;

    /// Reads many keys at once.
    ///
    /// Missing keys may either be omitted from the map or mapped to an empty
    /// value; callers must treat both as "not cached".
    async fn read_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>>;
}

/// Write side of a cache backend.
#[async_trait]
pub trait CacheWriter: CacheReader {
    /// Stores a value. A zero `ttl` means the entry does not expire.
    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()>;

    /// Removes a key.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Miss` when the backend can tell the key was absent.
    async fn delete(&self, key: &str) -> BackendResult<()>;
}

#[async_trait]
impl<T: CacheReader + ?Sized> CacheReader for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn read(&self, key: &str) -> BackendResult<Vec<u8>> {
        (**self).read(key).await
    }

    async fn read_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        (**self).read_multi(keys).await
    }
}

#[async_trait]
impl<T: CacheWriter + ?Sized> CacheWriter for Arc<T> {
    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()> {
        (**self).write(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        (**self).delete(key).await
    }
}
