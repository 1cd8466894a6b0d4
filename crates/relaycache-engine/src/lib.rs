//! # relaycache-engine
//!
//! Read-through / fetch-through access to a cache backend with a remote HTTP
//! origin behind it.
//!
//! - [`Provider`] - the cache engine: read, write, fetch and their batch forms
//! - [`RemoteProvider`] - fetch-only variant reporting [`FetchInfo`] per key
//! - [`Resolver`] - maps a cache key to the request that fetches it
//!
//! Batch operations return a [`Batch`]: the values that succeeded plus an
//! optional [`BatchError`] with one entry per failed key.

pub mod batch;
pub mod error;
pub mod fetch;
pub mod provider;
pub mod remote;
pub mod request;
pub mod resolver;

pub use batch::Batch;
pub use error::{BatchError, EngineError, FetchInfo, KeyError, Result};
pub use fetch::{DEFAULT_TIMEOUT, Fetched, HttpFetcher};
pub use provider::{Provider, ProviderBuilder};
pub use remote::{RemoteBatch, RemoteProvider, RemoteProviderBuilder};
pub use request::RequestTemplate;
pub use resolver::{Resolver, RouteResolver, TemplateResolver};
