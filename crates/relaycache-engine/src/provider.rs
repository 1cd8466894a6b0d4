//! The read-through / fetch-through cache engine.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use relaycache_core::{MetricTracer, decode_json, decode_map};
use relaycache_storage::{CacheReader, CacheWriter};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::batch::{Batch, dedup_keys};
use crate::error::Result;
use crate::remote::{RemoteProvider, RemoteProviderBuilder};
use crate::request::RequestTemplate;
use crate::resolver::Resolver;

/// Cache engine over a backend `B` and a remote origin.
///
/// Every method is a self-contained protocol over the backend, the resolver
/// and the HTTP client; the engine itself is immutable after construction and
/// can be shared across tasks (wrap it in an `Arc`).
///
/// Cache errors are best-effort: [`Provider::read_fetch`] and
/// [`Provider::read_fetch_multi`] swallow them and go to the origin. Origin
/// errors are always reported, per key for batches.
///
/// # Example
///
/// ```ignore
/// use relaycache_engine::{Provider, RequestTemplate, RouteResolver};
/// use relaycache_storage::MemoryBackend;
///
/// let provider = Provider::builder(MemoryBackend::new())
///     .prefix("zzz")
///     .resolver(RouteResolver::new().route("zzz:zoo", "/zoo"))
///     .build();
///
/// let template = RequestTemplate::get("http://origin.local/")?;
/// let body = provider.read_fetch("zoo", &template).await?;
/// ```
pub struct Provider<B> {
    backend: B,
    remote: RemoteProvider,
    tracer: Arc<dyn MetricTracer>,
}

impl<B: std::fmt::Debug> std::fmt::Debug for Provider<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("backend", &self.backend)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl<B: CacheReader> Provider<B> {
    pub fn builder(backend: B) -> ProviderBuilder<B> {
        ProviderBuilder {
            backend,
            remote: RemoteProvider::builder(),
        }
    }

    /// Backend identifier.
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Namespace prefix applied to every key.
    pub fn namespace(&self) -> &str {
        self.remote.namespace()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The fetch-only half of this engine.
    pub fn remote(&self) -> &RemoteProvider {
        &self.remote
    }

    pub fn normalize(&self, key: &str) -> String {
        self.remote.normalize(key)
    }

    pub fn normalize_multi<S: AsRef<str>>(&self, keys: &[S]) -> Vec<String> {
        self.remote.normalize_multi(keys)
    }

    /// Reads one key from the backend.
    ///
    /// A miss is returned as an error; callers decide whether to fetch.
    pub async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let key = self.normalize(key);
        let started = Instant::now();

        let value = self.backend.read(&key).await?;

        self.tracer
            .cache_latency(self.backend.name(), "Read", started.elapsed());
        self.tracer.incr_cache_counter();
        Ok(value)
    }

    /// Reads one key and decodes it as a JSON object.
    pub async fn read_map(&self, key: &str) -> Result<Map<String, Value>> {
        let bytes = self.read(key).await?;
        Ok(decode_map(&bytes)?)
    }

    /// Reads one key and decodes it as JSON into `T`.
    pub async fn read_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let bytes = self.read(key).await?;
        Ok(decode_json(&bytes)?)
    }

    /// Reads many keys at once.
    ///
    /// The map holds one entry per distinct normalized key; keys the backend
    /// did not return map to an empty value.
    pub async fn read_multi<S: AsRef<str>>(&self, keys: &[S]) -> Result<HashMap<String, Vec<u8>>> {
        let keys = dedup_keys(self.normalize_multi(keys));
        self.read_normalized(&keys).await
    }

    async fn read_normalized(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let started = Instant::now();
        let mut found = self.backend.read_multi(keys).await?;

        self.tracer
            .cache_latency(self.backend.name(), "ReadMulti", started.elapsed());

        let requested: HashSet<&str> = keys.iter().map(String::as_str).collect();
        // Drop anything the backend returned that was not asked for
        found.retain(|key, _| requested.contains(key.as_str()));
        for key in keys {
            found.entry(key.clone()).or_default();
        }
        Ok(found)
    }

    /// Fetches one key from the remote origin, bypassing the cache.
    pub async fn fetch(&self, key: &str, template: &RequestTemplate) -> Result<Vec<u8>> {
        Ok(self.remote.fetch(key, template).await?.body)
    }

    /// Fetches one key and decodes it as a JSON object.
    pub async fn fetch_map(&self, key: &str, template: &RequestTemplate) -> Result<Map<String, Value>> {
        let bytes = self.fetch(key, template).await?;
        Ok(decode_map(&bytes)?)
    }

    /// Fetches every key concurrently from the origin.
    ///
    /// Returns the successes and, when any key failed, a [`BatchError`]
    /// naming each failed key. One failure never drops another key's value.
    ///
    /// [`BatchError`]: crate::error::BatchError
    pub async fn fetch_multi<S: AsRef<str>>(
        &self,
        keys: &[S],
        template: &RequestTemplate,
    ) -> Batch<Vec<u8>> {
        let keys = dedup_keys(self.normalize_multi(keys));
        self.fetch_bodies(keys, template).await
    }

    async fn fetch_bodies(&self, keys: Vec<String>, template: &RequestTemplate) -> Batch<Vec<u8>> {
        let batch = self.remote.fetch_all(keys, template).await;
        Batch {
            values: batch
                .values
                .into_iter()
                .map(|(key, fetched)| (key, fetched.body))
                .collect(),
            error: batch.error,
        }
    }

    /// Reads from the cache, falling back to the origin on any cache error.
    ///
    /// Only the fetch error is ever returned.
    pub async fn read_fetch(&self, key: &str, template: &RequestTemplate) -> Result<Vec<u8>> {
        match self.read(key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "cache read failed, fetching from origin");
                self.fetch(key, template).await
            }
        }
    }

    /// Batch read-through.
    ///
    /// Keys with a non-empty cached value are served from the cache; the rest
    /// are fetched concurrently. Cache errors are logged and treated as
    /// all-miss. Keys whose fetch failed are absent from the map and listed
    /// in the error.
    pub async fn read_fetch_multi<S: AsRef<str>>(
        &self,
        keys: &[S],
        template: &RequestTemplate,
    ) -> Batch<Vec<u8>> {
        let keys = dedup_keys(self.normalize_multi(keys));

        let mut merged = match self.read_normalized(&keys).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    backend = %self.backend.name(),
                    error = %e,
                    "cache read_multi failed, fetching every key from origin"
                );
                HashMap::new()
            }
        };

        let uncached: Vec<String> = keys
            .iter()
            .filter(|key| merged.get(*key).is_none_or(|value| value.is_empty()))
            .cloned()
            .collect();

        tracing::debug!(
            requested = keys.len(),
            uncached = uncached.len(),
            "read_fetch_multi partition"
        );

        if uncached.is_empty() {
            return Batch {
                values: merged,
                error: None,
            };
        }

        let fetched = self.fetch_bodies(uncached, template).await;
        merged.extend(fetched.values);
        if let Some(error) = &fetched.error {
            for key in error.keys() {
                merged.remove(key);
            }
        }

        Batch {
            values: merged,
            error: fetched.error,
        }
    }
}

impl<B: CacheWriter> Provider<B> {
    /// Stores a value under the normalized key. A zero `ttl` means no expiry.
    pub async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let key = self.normalize(key);
        let started = Instant::now();

        self.backend.write(&key, value, ttl).await?;

        self.tracer
            .cache_latency(self.backend.name(), "Write", started.elapsed());
        Ok(())
    }

    /// Removes the normalized key.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let key = self.normalize(key);
        let started = Instant::now();

        self.backend.delete(&key).await?;

        self.tracer
            .cache_latency(self.backend.name(), "Delete", started.elapsed());
        Ok(())
    }
}

/// Builder for [`Provider`].
pub struct ProviderBuilder<B> {
    backend: B,
    remote: RemoteProviderBuilder,
}

impl<B: CacheReader> ProviderBuilder<B> {
    /// Sets the namespace prefix applied to every key.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.remote = self.remote.prefix(prefix);
        self
    }

    /// Sets the key resolver. Defaults to an empty route table, so every
    /// fetch fails as unresolvable until one is configured.
    #[must_use]
    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.remote = self.remote.resolver(resolver);
        self
    }

    #[must_use]
    pub fn shared_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.remote = self.remote.shared_resolver(resolver);
        self
    }

    /// Sets the HTTP client used for remote fetches.
    #[must_use]
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.remote = self.remote.client(client);
        self
    }

    /// Sets the per-request timeout (default 30s).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.remote = self.remote.timeout(timeout);
        self
    }

    /// Sets the metric tracer for both cache and remote calls.
    #[must_use]
    pub fn tracer(mut self, tracer: Arc<dyn MetricTracer>) -> Self {
        self.remote = self.remote.tracer(tracer);
        self
    }

    /// Caps in-flight fetches per batch; 0 means one per key.
    #[must_use]
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.remote = self.remote.max_concurrency(limit);
        self
    }

    pub fn build(self) -> Provider<B> {
        tracing::debug!(
            backend = %self.backend.name(),
            prefix = %self.remote.prefix_value(),
            "cache provider built"
        );
        let tracer = self.remote.tracer_handle();
        Provider {
            backend: self.backend,
            remote: self.remote.build(),
            tracer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use relaycache_core::CoreError;
    use relaycache_storage::MemoryBackend;

    fn sample() -> MemoryBackend {
        MemoryBackend::with_entries([
            ("foo", r#"{"foo":"bar"}"#),
            ("yyy:foo", r#"{"yyy":"bar"}"#),
            ("zzz:foo", r#"{"zzz":"bar"}"#),
            ("zzz:boo", r#"{"zzz":"baz"}"#),
            ("zzz:list", "[1,2]"),
        ])
    }

    #[tokio::test]
    async fn test_name_and_namespace() {
        let provider = Provider::builder(sample()).prefix("zzz").build();
        assert_eq!(provider.name(), "Memory");
        assert_eq!(provider.namespace(), "zzz");

        let bare = Provider::builder(sample()).build();
        assert_eq!(bare.namespace(), "");
    }

    #[tokio::test]
    async fn test_read_uses_own_namespace() {
        let provider = Provider::builder(sample()).prefix("zzz").build();
        assert_eq!(provider.read("foo").await.unwrap(), br#"{"zzz":"bar"}"#);
        assert_eq!(provider.read("yyy:foo").await.unwrap(), br#"{"zzz":"bar"}"#);

        let unprefixed = Provider::builder(sample()).build();
        assert_eq!(unprefixed.read("yyy:foo").await.unwrap(), br#"{"foo":"bar"}"#);
    }

    #[tokio::test]
    async fn test_read_map_and_read_as() {
        let provider = Provider::builder(sample()).prefix("zzz").build();

        let map = provider.read_map("foo").await.unwrap();
        assert_eq!(map["zzz"], "bar");

        let list: Vec<u8> = provider.read_as("list").await.unwrap();
        assert_eq!(list, vec![1, 2]);

        assert!(matches!(
            provider.read_map("list").await,
            Err(EngineError::Decode(CoreError::NotAnObject))
        ));
    }

    #[tokio::test]
    async fn test_write_and_delete_normalize_keys() {
        let backend = MemoryBackend::new();
        let provider = Provider::builder(backend.clone()).prefix("zzz").build();

        provider
            .write("other:foo", b"bar", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(backend.read("zzz:foo").await.unwrap(), b"bar");

        provider.delete("foo").await.unwrap();
        assert!(backend.read("zzz:foo").await.is_err());
        assert!(provider.delete("foo").await.unwrap_err().is_backend());
    }

    #[tokio::test]
    async fn test_read_multi_fills_missing_keys() {
        let provider = Provider::builder(sample()).prefix("zzz").build();
        let found = provider
            .read_multi(&["foo", "boo", "nope", "yyy:foo"])
            .await
            .unwrap();

        assert_eq!(found.len(), 3);
        assert_eq!(found["zzz:foo"], br#"{"zzz":"bar"}"#);
        assert_eq!(found["zzz:boo"], br#"{"zzz":"baz"}"#);
        assert!(found["zzz:nope"].is_empty());
    }
}
