//! Memcached backend using the `async-memcached` client.
//!
//! The client is a single text-protocol connection, so it sits behind a
//! mutex and every operation is bounded by the configured timeout (100ms by
//! default). A reply that never arrived in time may still be sitting in the
//! socket, so after a timeout or a malformed reply the connection is dropped
//! and the next operation reconnects.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_memcached::{Client, Error as MemcacheError, Status};
use async_trait::async_trait;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use relaycache_core::MemcachedConfig;
use tokio::sync::Mutex;

use crate::error::{BackendError, BackendResult};
use crate::redact_url;
use crate::traits::{CacheReader, CacheWriter};

/// Longest key the memcached text protocol accepts.
pub const MAX_KEY_LEN: usize = 250;

/// Longest TTL memcached treats as relative; larger values are unix timestamps.
const MAX_RELATIVE_TTL_SECS: u64 = 60 * 60 * 24 * 30;

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Memcached-backed cache.
///
/// With `compress` enabled, values are zlib-compressed on write. Reads fall
/// back to the raw bytes when a value is not a zlib stream, so caches written
/// by uncompressed clients stay readable.
#[derive(Clone)]
pub struct MemcachedBackend {
    /// `None` once the connection has been dropped and not yet reopened.
    client: Arc<Mutex<Option<Client>>>,
    url: String,
    compress: bool,
    timeout: Duration,
}

impl std::fmt::Debug for MemcachedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcachedBackend")
            .field("url", &redact_url(&self.url))
            .field("compress", &self.compress)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MemcachedBackend {
    /// Connects to the server and checks that it answers `version`.
    pub async fn connect(config: &MemcachedConfig) -> BackendResult<Self> {
        let timeout = if config.timeout_ms == 0 {
            DEFAULT_TIMEOUT
        } else {
            Duration::from_millis(config.timeout_ms)
        };

        let client = open(&config.url, timeout).await?;
        let backend = Self {
            client: Arc::new(Mutex::new(Some(client))),
            url: config.url.clone(),
            compress: config.compress,
            timeout,
        };
        backend.version().await?;

        tracing::info!(url = %redact_url(&config.url), compress = config.compress, "Connected to Memcached");
        Ok(backend)
    }

    /// Server version string, doubles as a health check.
    pub async fn version(&self) -> BackendResult<String> {
        let mut slot = self.client.lock().await;
        let client = self.connection(&mut slot).await?;
        let outcome = bounded(self.timeout, "version", client.version()).await;

        settle(&mut slot, "version", outcome)?
            .map(|v| v.trim_end().to_string())
            .map_err(|e| client_error("VERSION", e))
    }

    /// Returns the live connection, reopening it if it was dropped.
    async fn connection<'a>(&self, slot: &'a mut Option<Client>) -> BackendResult<&'a mut Client> {
        if slot.is_none() {
            *slot = Some(open(&self.url, self.timeout).await?);
            tracing::debug!(url = %redact_url(&self.url), "Reconnected to Memcached");
        }
        slot.as_mut()
            .ok_or_else(|| BackendError::connection("memcached connection unavailable"))
    }

    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        validate_key(key)?;

        let mut slot = self.client.lock().await;
        let client = self.connection(&mut slot).await?;
        let outcome = bounded(self.timeout, "get", client.get(key)).await;
        let value = settle(&mut slot, "get", outcome)?.map_err(|e| client_error("GET", e))?;

        Ok(value.map(|v| self.read_value(v.data)))
    }

    fn read_value(&self, data: Vec<u8>) -> Vec<u8> {
        if !self.compress {
            return data;
        }
        decompress(&data).unwrap_or(data)
    }

    fn write_value(&self, value: &[u8]) -> BackendResult<Vec<u8>> {
        if !self.compress {
            return Ok(value.to_vec());
        }
        compress(value).map_err(|e| BackendError::decode(format!("zlib compression failed: {e}")))
    }
}

#[async_trait]
impl CacheReader for MemcachedBackend {
    fn name(&self) -> &str {
        "Memcached"
    }

    async fn read(&self, key: &str) -> BackendResult<Vec<u8>> {
        match self.get(key).await? {
            Some(data) => {
                tracing::debug!(key = %key, "cache hit (memcached)");
                Ok(data)
            }
            None => {
                tracing::debug!(key = %key, "cache miss (memcached)");
                Err(BackendError::miss(key))
            }
        }
    }

    async fn read_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        for key in keys {
            validate_key(key)?;
        }

        let values = {
            let mut slot = self.client.lock().await;
            let client = self.connection(&mut slot).await?;
            let outcome = bounded(self.timeout, "get_many", client.get_many(keys)).await;
            match settle(&mut slot, "get_many", outcome)? {
                Ok(values) => values,
                // No VALUE lines at all
                Err(MemcacheError::Protocol(Status::NotFound)) => Vec::new(),
                Err(e) => return Err(client_error("GET", e)),
            }
        };

        let requested: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let mut found = HashMap::with_capacity(values.len());
        for value in values {
            let Ok(key) = String::from_utf8(value.key) else {
                continue;
            };
            if requested.contains(key.as_str()) {
                found.insert(key, self.read_value(value.data));
            }
        }
        tracing::debug!(requested = keys.len(), found = found.len(), "cache get_many (memcached)");
        Ok(found)
    }
}

#[async_trait]
impl CacheWriter for MemcachedBackend {
    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()> {
        validate_key(key)?;
        let data = self.write_value(value)?;
        let exptime = expiration(ttl, SystemTime::now());

        let mut slot = self.client.lock().await;
        let client = self.connection(&mut slot).await?;
        let outcome = bounded(
            self.timeout,
            "set",
            client.set(key, data.as_slice(), exptime, None),
        )
        .await;
        settle(&mut slot, "set", outcome)?.map_err(|e| client_error("SET", e))?;

        tracing::debug!(key = %key, exptime = ?exptime, "cache set (memcached)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        validate_key(key)?;

        let mut slot = self.client.lock().await;
        let client = self.connection(&mut slot).await?;
        let outcome = bounded(self.timeout, "delete", client.delete(key)).await;
        match settle(&mut slot, "delete", outcome)? {
            Ok(()) => {
                tracing::debug!(key = %key, "cache del (memcached)");
                Ok(())
            }
            Err(MemcacheError::Protocol(Status::NotFound)) => Err(BackendError::miss(key)),
            Err(e) => Err(client_error("DELETE", e)),
        }
    }
}

async fn open(url: &str, timeout: Duration) -> BackendResult<Client> {
    bounded(timeout, "connect", Client::new(url))
        .await?
        .map_err(|e| BackendError::connection(format!("Failed to connect to memcached: {e}")))
}

async fn bounded<F: Future>(timeout: Duration, operation: &str, fut: F) -> BackendResult<F::Output> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| BackendError::timeout(format!("memcached {operation}")))
}

/// Drops the connection when its stream can no longer be trusted.
///
/// A timed-out request may still get its reply later, and a malformed reply
/// leaves unparsed bytes behind; either would be read as the answer to the
/// next command.
fn settle<T>(
    slot: &mut Option<Client>,
    operation: &str,
    outcome: BackendResult<Result<T, MemcacheError>>,
) -> BackendResult<Result<T, MemcacheError>> {
    let desynced = match &outcome {
        Err(_) => true,
        Ok(Err(e)) => !is_plain_status(e),
        Ok(Ok(_)) => false,
    };
    if desynced && slot.take().is_some() {
        tracing::warn!(operation, "Dropping Memcached connection after failed {operation}");
    }
    outcome
}

/// Complete status replies that leave the stream in sync.
fn is_plain_status(error: &MemcacheError) -> bool {
    matches!(
        error,
        MemcacheError::Protocol(Status::NotFound | Status::NotStored | Status::Exists)
    )
}

fn client_error(command: &str, error: MemcacheError) -> BackendError {
    match error {
        MemcacheError::Connect(e) | MemcacheError::Io(e) => {
            BackendError::connection(format!("Memcached {command} failed: {e}"))
        }
        other => BackendError::command(format!("Memcached {command} failed: {other}")),
    }
}

/// Rejects keys the text protocol cannot carry.
///
/// Whitespace or control bytes would split the command line, turning one GET
/// into several commands or a multi-get.
pub fn validate_key(key: &str) -> BackendResult<()> {
    if key.is_empty() {
        return Err(BackendError::invalid_key(key, "empty key"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(BackendError::invalid_key(
            key,
            format!("longer than {MAX_KEY_LEN} bytes"),
        ));
    }
    if key.bytes().any(|b| b <= b' ' || b == 0x7f) {
        return Err(BackendError::invalid_key(
            key,
            "contains whitespace or control characters",
        ));
    }
    Ok(())
}

/// Converts a TTL to a memcached exptime. Zero means no expiry.
fn expiration(ttl: Duration, now: SystemTime) -> Option<i64> {
    if ttl.is_zero() {
        return None;
    }
    // Round up, an exptime of 0 would never expire
    let seconds = ttl
        .as_secs()
        .saturating_add(u64::from(ttl.subsec_nanos() > 0));

    let exptime = if seconds <= MAX_RELATIVE_TTL_SECS {
        seconds
    } else {
        let epoch = now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
        epoch.saturating_add(seconds)
    };
    Some(i64::try_from(exptime).unwrap_or(i64::MAX))
}

fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}
