//! Outbound request description.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{EngineError, Result};

/// An HTTP request shape: method, URL and headers.
///
/// Callers pass one template per call; resolvers clone it per key, so every
/// concurrently issued request owns its URL and header map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl RequestTemplate {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// A `GET` template for the given URL.
    pub fn get(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| EngineError::invalid_request(format!("invalid url {url:?}: {e}")))?;
        Ok(Self::new(Method::GET, url))
    }

    /// Adds a header, replacing any previous value with the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| EngineError::invalid_request(format!("invalid header name: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| EngineError::invalid_request(format!("invalid header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Returns a copy with the URL path replaced.
    pub fn with_path(&self, path: &str) -> Self {
        let mut request = self.clone();
        request.url.set_path(path);
        request
    }

    /// Path component, used as the metric route label.
    pub fn route(&self) -> &str {
        self.url.path()
    }
}
