#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use relaycache_core::MetricTracer;
use relaycache_engine::{RequestTemplate, RouteResolver};
use relaycache_storage::{BackendError, BackendResult, CacheReader, CacheWriter, MemoryBackend};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Origin serving `/zoo`, `/zoo2` and a failing `/bad`.
pub async fn start_origin() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zoo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"zoo":"zac"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/zoo2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"zoo":"zed"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    server
}

pub fn template(server: &MockServer) -> RequestTemplate {
    RequestTemplate::get(&server.uri()).expect("mock server uri")
}

pub fn zzz_routes() -> RouteResolver {
    RouteResolver::new()
        .route("zzz:zoo", "/zoo")
        .route("zzz:zoo2", "/zoo2")
        .route("zzz:bad", "/bad")
        .route("zzz:foo", "/foo")
}

pub fn sample_backend() -> MemoryBackend {
    MemoryBackend::with_entries([
        ("foo", r#"{"foo":"bar"}"#),
        ("yyy:foo", r#"{"yyy":"bar"}"#),
        ("zzz:foo", r#"{"zzz":"bar"}"#),
        ("zzz:boo", r#"{"zzz":"baz"}"#),
    ])
}

/// Backend where every operation fails.
#[derive(Debug, Default)]
pub struct BrokenBackend;

#[async_trait]
impl CacheReader for BrokenBackend {
    fn name(&self) -> &str {
        "cache/broken"
    }

    async fn read(&self, _key: &str) -> BackendResult<Vec<u8>> {
        Err(BackendError::command("example error from Read"))
    }

    async fn read_multi(&self, _keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        Err(BackendError::command("example error from ReadMulti"))
    }
}

#[async_trait]
impl CacheWriter for BrokenBackend {
    async fn write(&self, _key: &str, _value: &[u8], _ttl: Duration) -> BackendResult<()> {
        Err(BackendError::command("example error from Write"))
    }

    async fn delete(&self, _key: &str) -> BackendResult<()> {
        Err(BackendError::command("example error from Delete"))
    }
}

/// Backend that returns explicit empty values for misses.
#[derive(Debug)]
pub struct PlaceholderBackend {
    pub data: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl CacheReader for PlaceholderBackend {
    fn name(&self) -> &str {
        "cache/placeholder"
    }

    async fn read(&self, key: &str) -> BackendResult<Vec<u8>> {
        self.data.get(key).cloned().ok_or_else(|| BackendError::miss(key))
    }

    async fn read_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        Ok(keys
            .iter()
            .map(|k| (k.clone(), self.data.get(k).cloned().unwrap_or_default()))
            .collect())
    }
}

/// Backend whose multi-read answers with every entry it holds.
#[derive(Debug)]
pub struct OverSharingBackend {
    pub data: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl CacheReader for OverSharingBackend {
    fn name(&self) -> &str {
        "cache/oversharing"
    }

    async fn read(&self, key: &str) -> BackendResult<Vec<u8>> {
        self.data.get(key).cloned().ok_or_else(|| BackendError::miss(key))
    }

    async fn read_multi(&self, _keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        Ok(self.data.clone())
    }
}

/// Tracer that counts every hook invocation.
#[derive(Debug, Default)]
pub struct CountingTracer {
    pub cache_hits: AtomicUsize,
    pub backend_fetches: AtomicUsize,
    pub cache_actions: Mutex<Vec<(String, String)>>,
    pub backend_calls: Mutex<Vec<(String, u16)>>,
}

impl CountingTracer {
    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::SeqCst)
    }

    pub fn backend_fetches(&self) -> usize {
        self.backend_fetches.load(Ordering::SeqCst)
    }

    pub fn cache_actions(&self) -> Vec<(String, String)> {
        self.cache_actions.lock().unwrap().clone()
    }

    pub fn backend_calls(&self) -> Vec<(String, u16)> {
        self.backend_calls.lock().unwrap().clone()
    }
}

impl MetricTracer for CountingTracer {
    fn cache_latency(&self, name: &str, action: &str, _elapsed: Duration) {
        self.cache_actions
            .lock()
            .unwrap()
            .push((name.to_string(), action.to_string()));
    }

    fn backend_latency(&self, route: &str, status_code: u16, _elapsed: Duration) {
        self.backend_calls
            .lock()
            .unwrap()
            .push((route.to_string(), status_code));
    }

    fn incr_cache_counter(&self) {
        self.cache_hits.fetch_add(1, Ordering::SeqCst);
    }

    fn incr_backend_counter(&self) {
        self.backend_fetches.fetch_add(1, Ordering::SeqCst);
    }
}
