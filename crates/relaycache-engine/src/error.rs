//! Engine error types.
//!
//! Single-key operations fail with [`EngineError`]. Batch operations never
//! fail as a whole: they return the values that succeeded together with an
//! optional [`BatchError`] listing every key that did not.

use std::fmt;

use relaycache_core::CoreError;
use relaycache_storage::BackendError;
use serde::Serialize;

/// Where a remote fetch went and what the origin answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchInfo {
    pub remote_url: String,
    pub status_code: u16,
}

/// Errors produced by the cache engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The cache backend failed or missed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The resolver has no mapping for the key.
    #[error("{reason}")]
    Unresolvable {
        /// The key that could not be resolved.
        key: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The request template or resolved request is malformed.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// The client-side timeout elapsed before the origin answered.
    #[error("request to {url} timed out")]
    Timeout {
        /// The requested URL.
        url: String,
    },

    /// The request never produced an HTTP response.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// The requested URL.
        url: String,
        /// Description of the transport failure.
        message: String,
    },

    /// The origin answered with a status other than 200.
    #[error("invalid http status: {status_text} ({})", .info.remote_url)]
    UpstreamStatus {
        /// URL and status code of the failed fetch.
        info: FetchInfo,
        /// Status line, e.g. `500 Internal Server Error`.
        status_text: String,
    },

    /// A payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] CoreError),
}

impl EngineError {
    /// Creates a new `Unresolvable` error.
    #[must_use]
    pub fn unresolvable(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unresolvable {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Returns the fetch metadata when the origin answered with a bad status.
    #[must_use]
    pub fn fetch_info(&self) -> Option<&FetchInfo> {
        match self {
            Self::UpstreamStatus { info, .. } => Some(info),
            _ => None,
        }
    }

    /// Returns `true` if this is a client-side timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the error came from the cache backend.
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// Failure of one key inside a batch.
#[derive(Debug, thiserror::Error)]
#[error("{key}: {source}")]
pub struct KeyError {
    pub key: String,
    #[source]
    pub source: EngineError,
}

impl KeyError {
    pub fn new(key: impl Into<String>, source: EngineError) -> Self {
        Self {
            key: key.into(),
            source,
        }
    }
}

/// Every per-key failure of a batch operation.
///
/// Never empty: a batch without failures reports `None` instead.
#[derive(Debug)]
pub struct BatchError {
    errors: Vec<KeyError>,
}

impl BatchError {
    /// Wraps the collected failures, or returns `None` when there are none.
    pub fn from_errors(errors: Vec<KeyError>) -> Option<Self> {
        (!errors.is_empty()).then_some(Self { errors })
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyError> {
        self.errors.iter()
    }

    /// Keys that failed, in collection order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&KeyError> {
        self.errors.iter().find(|e| e.key == key)
    }

    pub fn into_errors(self) -> Vec<KeyError> {
        self.errors
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() == 1 {
            writeln!(f, "1 error occurred:")?;
        } else {
            writeln!(f, "{} errors occurred:", self.errors.len())?;
        }
        for err in &self.errors {
            writeln!(f, "\t* {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

impl<'a> IntoIterator for &'a BatchError {
    type Item = &'a KeyError;
    type IntoIter = std::slice::Iter<'a, KeyError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
