use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    pub cache: CacheSettings,
    pub remote: RemoteSettings,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

impl RelayConfig {
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(CoreError::configuration)
    }

    fn check(&self) -> std::result::Result<(), String> {
        // Remote validations
        if self.remote.timeout_ms == 0 {
            return Err("remote.timeout_ms must be > 0".into());
        }
        if let Some(origin) = self.remote.origin.as_deref() {
            let parsed =
                Url::parse(origin).map_err(|e| format!("remote.origin is not a valid URL: {e}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err("remote.origin must use http or https".into());
            }
        }
        if !self.remote.path_template.starts_with('/') {
            return Err("remote.path_template must start with '/'".into());
        }
        // Backend validations
        match self.backend.kind {
            BackendKind::Memory => {}
            BackendKind::Redis => {
                if self.backend.redis.url.trim().is_empty() {
                    return Err("backend.kind=redis requires backend.redis.url".into());
                }
                if self.backend.redis.pool_size == 0 {
                    return Err("backend.redis.pool_size must be > 0".into());
                }
            }
            BackendKind::Memcached => {
                if self.backend.memcached.url.trim().is_empty() {
                    return Err("backend.kind=memcached requires backend.memcached.url".into());
                }
                if self.backend.memcached.timeout_ms == 0 {
                    return Err("backend.memcached.timeout_ms must be > 0".into());
                }
            }
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

/// Namespace settings shared by every cache built from this config.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheSettings {
    /// Namespace prefix applied to every key; empty means no namespace.
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Origin base URL used by the template resolver.
    pub origin: Option<String>,
    /// Path appended to the origin; `{key}` and `{id}` are substituted.
    pub path_template: String,
    pub timeout_ms: u64,
    /// Upper bound on in-flight fetches per batch; 0 means one per key.
    pub max_concurrency: usize,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            origin: None,
            path_template: default_path_template(),
            timeout_ms: default_remote_timeout_ms(),
            max_concurrency: 0,
        }
    }
}

impl RemoteSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_path_template() -> String {
    "/{id}".into()
}

fn default_remote_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Redis,
    Memcached,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub redis: RedisConfig,
    pub memcached: MemcachedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".into(),
            pool_size: 10,
            timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemcachedConfig {
    pub url: String,
    /// Zlib-compress stored values.
    pub compress: bool,
    pub timeout_ms: u64,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self {
            url: "tcp://127.0.0.1:11211".into(),
            compress: false,
            timeout_ms: default_memcached_timeout_ms(),
        }
    }
}

fn default_memcached_timeout_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

pub mod loader {
    use super::RelayConfig;
    use crate::error::{CoreError, Result};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default config file, read from the working directory when present.
    pub const DEFAULT_CONFIG_FILE: &str = "relaycache.toml";

    pub fn load_config(path: Option<&str>) -> Result<RelayConfig> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(CoreError::configuration(format!("config file not found: {p}")));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., RELAYCACHE__CACHE__PREFIX=api
        builder = builder.add_source(
            Environment::with_prefix("RELAYCACHE")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| CoreError::configuration(format!("config build error: {e}")))?;
        let merged: RelayConfig = cfg
            .try_deserialize()
            .map_err(|e| CoreError::configuration(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
