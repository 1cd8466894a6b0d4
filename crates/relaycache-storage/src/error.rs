//! Backend error types.

/// Errors returned by cache backends.
///
/// The engine treats every read error as "not cached"; [`BackendError::is_miss`]
/// only exists for callers that want to tell a miss apart from an outage.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The key is not present in the backend.
    #[error("cache miss: {key}")]
    Miss {
        /// The key that was looked up.
        key: String,
    },

    /// Failed to reach the backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The backend rejected or failed a command.
    #[error("Command error: {message}")]
    Command {
        /// Description of the command error.
        message: String,
    },

    /// The backend did not answer in time.
    #[error("Backend operation timed out: {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },

    /// A stored value could not be decoded.
    #[error("Value decode error: {message}")]
    Decode {
        /// Description of the decode error.
        message: String,
    },

    /// The key cannot be sent to the backend as-is.
    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why the key was rejected.
        reason: String,
    },
}

impl BackendError {
    /// Creates a new `Miss` error.
    #[must_use]
    pub fn miss(key: impl Into<String>) -> Self {
        Self::Miss { key: key.into() }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a cache miss.
    #[must_use]
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss { .. })
    }

    /// Returns `true` if the backend could not be reached or did not answer.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_connection_refusal() || err.is_io_error() {
            Self::connection(err.to_string())
        } else {
            Self::command(err.to_string())
        }
    }
}

impl From<deadpool_redis::PoolError> for BackendError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        match err {
            deadpool_redis::PoolError::Timeout(_) => Self::timeout("redis pool checkout"),
            other => Self::connection(other.to_string()),
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
