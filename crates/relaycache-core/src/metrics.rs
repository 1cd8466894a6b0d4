//! Metric and trace hooks for the cache engine.
//!
//! The engine reports through the [`MetricTracer`] trait. Every method has an
//! empty default body, so [`NoopTracer`] is the zero-configuration default and
//! custom tracers only override what they care about.
//!
//! [`MetricsTracer`] forwards everything to the `metrics` facade; install a
//! recorder (e.g. a Prometheus exporter) in the host application to export it.

use std::time::Duration;

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_LATENCY_SECONDS: &str = "relaycache_cache_latency_seconds";
    pub const BACKEND_LATENCY_SECONDS: &str = "relaycache_backend_latency_seconds";
    pub const CACHE_HITS_TOTAL: &str = "relaycache_cache_hits_total";
    pub const BACKEND_FETCHES_TOTAL: &str = "relaycache_backend_fetches_total";
}

/// Observability hooks invoked by the cache engine.
///
/// Implementations must be cheap and must never block; they are called on the
/// request path, including from concurrent batch fetches.
pub trait MetricTracer: Send + Sync {
    /// Latency of a cache backend action (`Read`, `ReadMulti`, ...).
    fn cache_latency(&self, _name: &str, _action: &str, _elapsed: Duration) {}

    /// Latency of a remote origin request.
    fn backend_latency(&self, _route: &str, _status_code: u16, _elapsed: Duration) {}

    /// Counts a cache hit.
    fn incr_cache_counter(&self) {}

    /// Counts a successful remote fetch.
    fn incr_backend_counter(&self) {}
}

/// Tracer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl MetricTracer for NoopTracer {}

/// Tracer backed by the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsTracer;

impl MetricsTracer {
    pub fn new() -> Self {
        Self
    }
}

impl MetricTracer for MetricsTracer {
    fn cache_latency(&self, name: &str, action: &str, elapsed: Duration) {
        histogram!(
            names::CACHE_LATENCY_SECONDS,
            "name" => name.to_string(),
            "action" => action.to_string()
        )
        .record(elapsed.as_secs_f64());
    }

    fn backend_latency(&self, route: &str, status_code: u16, elapsed: Duration) {
        histogram!(
            names::BACKEND_LATENCY_SECONDS,
            "route" => route_label(route),
            "status" => status_code.to_string()
        )
        .record(elapsed.as_secs_f64());
    }

    fn incr_cache_counter(&self) {
        counter!(names::CACHE_HITS_TOTAL).increment(1);
    }

    fn incr_backend_counter(&self) {
        counter!(names::BACKEND_FETCHES_TOTAL).increment(1);
    }
}

/// Reduces route cardinality by replacing id-like path segments with `{id}`.
fn route_label(route: &str) -> String {
    route
        .split('/')
        .map(|segment| if is_likely_id(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// Check if a path segment looks like an identifier (UUID, numeric, long token).
fn is_likely_id(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }

    if s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4 {
        return true;
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    s.len() > 12 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
