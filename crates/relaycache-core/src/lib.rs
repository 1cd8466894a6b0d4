//! # relaycache-core
//!
//! Shared building blocks for the relaycache workspace:
//!
//! - [`key`] - namespace-aware cache key normalization
//! - [`metrics`] - latency/counter hooks called by the cache engine
//! - [`codec`] - convenience decoders for cached payloads
//! - [`config`] - configuration model and loader
//! - [`observability`] - tracing subscriber setup

pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod metrics;
pub mod observability;

pub use codec::{decode_json, decode_map, decode_msgpack};
pub use config::{
    BackendConfig, BackendKind, CacheSettings, LoggingConfig, MemcachedConfig, RedisConfig,
    RelayConfig, RemoteSettings,
};
pub use error::{CoreError, Result};
pub use key::{NAMESPACE_SEPARATOR, bare_key, normalize, normalize_multi};
pub use metrics::{MetricTracer, MetricsTracer, NoopTracer};
