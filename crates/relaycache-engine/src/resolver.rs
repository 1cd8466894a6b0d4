//! Key to request resolution.

use std::collections::HashMap;

use url::Url;

use crate::error::{EngineError, Result};
use crate::request::RequestTemplate;
use relaycache_core::bare_key;

/// Maps a normalized cache key to the outbound request that fetches it.
///
/// Resolution is synchronous and must not share mutable state between the
/// requests it returns: the engine resolves every key of a batch from the same
/// template and issues the results concurrently.
pub trait Resolver: Send + Sync {
    /// Builds the request for `key`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Unresolvable` when the key has no mapping.
    fn resolve(&self, key: &str, template: &RequestTemplate) -> Result<RequestTemplate>;

    /// Produces an independent copy of the template.
    fn resolve_request(&self, template: &RequestTemplate) -> Result<RequestTemplate> {
        Ok(template.clone())
    }
}

/// Exact key to path table. Keys outside the table are unresolvable.
#[derive(Debug, Clone, Default)]
pub struct RouteResolver {
    routes: HashMap<String, String>,
}

impl RouteResolver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn route(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.routes.insert(key.into(), path.into());
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<K, P> FromIterator<(K, P)> for RouteResolver
where
    K: Into<String>,
    P: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, P)>>(iter: I) -> Self {
        Self {
            routes: iter
                .into_iter()
                .map(|(k, p)| (k.into(), p.into()))
                .collect(),
        }
    }
}

impl Resolver for RouteResolver {
    fn resolve(&self, key: &str, template: &RequestTemplate) -> Result<RequestTemplate> {
        let path = self
            .routes
            .get(key)
            .ok_or_else(|| EngineError::unresolvable(key, "unknown cache"))?;

        let request = self.resolve_request(template)?;
        Ok(request.with_path(path))
    }
}

/// Builds the request from a path pattern.
///
/// `{key}` expands to the full normalized key and `{id}` to the key without
/// its namespace. With an origin set, the path is joined onto it; otherwise
/// the template's own scheme and host are kept.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    origin: Option<Url>,
    pattern: String,
}

impl TemplateResolver {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            origin: None,
            pattern: pattern.into(),
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }

    fn expand(&self, key: &str) -> Result<String> {
        let id = bare_key(key);
        if id.is_empty() {
            return Err(EngineError::unresolvable(key, "empty key"));
        }
        Ok(self.pattern.replace("{key}", key).replace("{id}", id))
    }
}

impl Resolver for TemplateResolver {
    fn resolve(&self, key: &str, template: &RequestTemplate) -> Result<RequestTemplate> {
        let path = self.expand(key)?;
        let mut request = self.resolve_request(template)?;

        if let Some(origin) = &self.origin {
            request.url = origin.clone();
        }
        request.url.set_path(&path);
        Ok(request)
    }
}
