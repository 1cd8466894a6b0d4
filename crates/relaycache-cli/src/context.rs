use std::sync::Arc;

use anyhow::{Context, Result};
use relaycache_core::{MetricsTracer, RelayConfig};
use relaycache_engine::{Provider, RequestTemplate, TemplateResolver};
use relaycache_storage::Backend;
use url::Url;

use crate::cli::{Cli, Commands};

/// Applies command-line overrides on top of the loaded configuration.
pub fn apply_overrides(cli: &Cli, config: &mut RelayConfig) {
    if let Some(prefix) = &cli.prefix {
        config.cache.prefix = prefix.clone();
    }
    if let Some(origin) = &cli.origin {
        config.remote.origin = Some(origin.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
}

/// How to treat an unreachable Redis or Memcached backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendPolicy {
    /// Serve from a process-local memory cache instead.
    Fallback,
    /// Fail the command. Writes and deletes would otherwise be lost.
    Required,
}

impl BackendPolicy {
    pub fn for_command(command: &Commands) -> Self {
        match command {
            Commands::Write(_) | Commands::Delete(_) => BackendPolicy::Required,
            _ => BackendPolicy::Fallback,
        }
    }
}

/// Everything a command needs: the engine and the request template.
pub struct CacheContext {
    pub provider: Provider<Backend>,
    origin: Option<Url>,
    headers: Vec<(String, String)>,
}

impl CacheContext {
    pub async fn connect(
        config: &RelayConfig,
        headers: &[String],
        policy: BackendPolicy,
    ) -> Result<Self> {
        let origin = config
            .remote
            .origin
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("Invalid remote origin")?;

        let headers = headers
            .iter()
            .map(|h| parse_header(h))
            .collect::<Result<Vec<_>>>()?;

        let mut resolver = TemplateResolver::new(config.remote.path_template.clone());
        if let Some(origin) = &origin {
            resolver = resolver.with_origin(origin.clone());
        }

        let backend = match policy {
            BackendPolicy::Fallback => Backend::connect(&config.backend).await,
            BackendPolicy::Required => Backend::try_connect(&config.backend)
                .await
                .context("Cache backend is unavailable")?,
        };
        let provider = Provider::builder(backend)
            .prefix(config.cache.prefix.clone())
            .resolver(resolver)
            .timeout(config.remote.timeout())
            .max_concurrency(config.remote.max_concurrency)
            .tracer(Arc::new(MetricsTracer::new()))
            .build();

        tracing::debug!(
            backend = %provider.name(),
            namespace = %provider.namespace(),
            "cache context ready"
        );

        Ok(Self {
            provider,
            origin,
            headers,
        })
    }

    /// Request template for remote fetches; requires an origin.
    pub fn template(&self) -> Result<RequestTemplate> {
        let origin = self.origin.as_ref().context(
            "remote.origin is not configured (use --origin or RELAYCACHE__REMOTE__ORIGIN)",
        )?;

        let mut template = RequestTemplate::get(origin.as_str())?;
        for (name, value) in &self.headers {
            template = template.with_header(name, value)?;
        }
        Ok(template)
    }
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("Invalid header \"{raw}\". Expected format: Name: value"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid header \"{raw}\": empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}
