//! Fetch-only engine: resolver plus HTTP, no cache backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use relaycache_core::{MetricTracer, NoopTracer, normalize, normalize_multi};

use crate::batch::{Batch, dedup_keys, fan_out};
use crate::error::{BatchError, FetchInfo, Result};
use crate::fetch::{DEFAULT_TIMEOUT, Fetched, HttpFetcher};
use crate::request::RequestTemplate;
use crate::resolver::{Resolver, RouteResolver};

/// Result of [`RemoteProvider::fetch_multi`].
///
/// `info` has an entry for every key whose origin answered, including keys
/// that failed with a bad status, so callers can tell an origin 404 from a
/// network failure.
#[derive(Debug, Default)]
pub struct RemoteBatch {
    pub values: HashMap<String, Vec<u8>>,
    pub info: HashMap<String, FetchInfo>,
    pub error: Option<BatchError>,
}

/// Resolves keys and fetches them from the remote origin.
///
/// Shared read-only by every call; holds no per-request state.
#[derive(Clone)]
pub struct RemoteProvider {
    prefix: String,
    resolver: Arc<dyn Resolver>,
    fetcher: HttpFetcher,
    max_concurrency: usize,
}

impl std::fmt::Debug for RemoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteProvider")
            .field("prefix", &self.prefix)
            .field("fetcher", &self.fetcher)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl RemoteProvider {
    pub fn builder() -> RemoteProviderBuilder {
        RemoteProviderBuilder::default()
    }

    pub fn namespace(&self) -> &str {
        &self.prefix
    }

    pub fn normalize(&self, key: &str) -> String {
        normalize(key, &self.prefix)
    }

    pub fn normalize_multi<S: AsRef<str>>(&self, keys: &[S]) -> Vec<String> {
        normalize_multi(keys, &self.prefix)
    }

    pub fn timeout(&self) -> Duration {
        self.fetcher.timeout()
    }

    /// Fetches one key from the origin.
    ///
    /// An unresolvable key fails before any request is sent.
    pub async fn fetch(&self, key: &str, template: &RequestTemplate) -> Result<Fetched> {
        self.fetch_normalized(&self.normalize(key), template).await
    }

    /// Fetches every key concurrently. Failures are collected per key.
    pub async fn fetch_multi<S: AsRef<str>>(
        &self,
        keys: &[S],
        template: &RequestTemplate,
    ) -> RemoteBatch {
        let keys = dedup_keys(self.normalize_multi(keys));
        let batch = self.fetch_all(keys, template).await;

        let mut out = RemoteBatch {
            values: HashMap::with_capacity(batch.values.len()),
            info: HashMap::with_capacity(batch.values.len()),
            error: None,
        };
        for (key, fetched) in batch.values {
            out.info.insert(key.clone(), fetched.info);
            out.values.insert(key, fetched.body);
        }
        if let Some(error) = &batch.error {
            for failure in error {
                if let Some(info) = failure.source.fetch_info() {
                    out.info.insert(failure.key.clone(), info.clone());
                }
            }
        }
        out.error = batch.error;
        out
    }

    /// Fan-out over keys that are already normalized.
    pub(crate) async fn fetch_all(
        &self,
        keys: Vec<String>,
        template: &RequestTemplate,
    ) -> Batch<Fetched> {
        fan_out(keys, self.max_concurrency, |key| async move {
            let result = self.fetch_normalized(&key, template).await;
            (key, result)
        })
        .await
    }

    pub(crate) async fn fetch_normalized(
        &self,
        key: &str,
        template: &RequestTemplate,
    ) -> Result<Fetched> {
        let request = self.resolver.resolve(key, template)?;
        self.fetcher.fetch(request).await
    }
}

/// Builder for [`RemoteProvider`].
pub struct RemoteProviderBuilder {
    prefix: String,
    resolver: Arc<dyn Resolver>,
    client: Option<reqwest::Client>,
    timeout: Duration,
    tracer: Arc<dyn MetricTracer>,
    max_concurrency: usize,
}

impl Default for RemoteProviderBuilder {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            resolver: Arc::new(RouteResolver::new()),
            client: None,
            timeout: DEFAULT_TIMEOUT,
            tracer: Arc::new(NoopTracer),
            max_concurrency: 0,
        }
    }
}

impl RemoteProviderBuilder {
    /// Sets the namespace prefix applied to every key.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the key resolver. Defaults to an empty route table.
    #[must_use]
    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Sets a shared key resolver.
    #[must_use]
    pub fn shared_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Sets the HTTP client (connection pool, proxy, TLS settings).
    #[must_use]
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the per-request timeout. A zero duration keeps the 30s default.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        self
    }

    /// Sets the metric tracer. Defaults to [`NoopTracer`].
    #[must_use]
    pub fn tracer(mut self, tracer: Arc<dyn MetricTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Caps in-flight fetches per batch; 0 means one per key.
    #[must_use]
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }

    pub(crate) fn tracer_handle(&self) -> Arc<dyn MetricTracer> {
        Arc::clone(&self.tracer)
    }

    pub(crate) fn prefix_value(&self) -> &str {
        &self.prefix
    }

    pub fn build(self) -> RemoteProvider {
        let client = self.client.unwrap_or_default();
        RemoteProvider {
            prefix: self.prefix,
            resolver: self.resolver,
            fetcher: HttpFetcher::new(client, self.timeout, self.tracer),
            max_concurrency: self.max_concurrency,
        }
    }
}
