use anyhow::{Context, Result};
use relaycache_core::RelayConfig;
use relaycache_storage::redact_url;

pub fn show(config: &RelayConfig) -> Result<()> {
    println!("{}", render(config)?);
    Ok(())
}

/// Renders the configuration as TOML with connection passwords masked.
fn render(config: &RelayConfig) -> Result<String> {
    let mut shown = config.clone();
    shown.backend.redis.url = redact_url(&shown.backend.redis.url);
    shown.backend.memcached.url = redact_url(&shown.backend.memcached.url);
    shown.remote.origin = shown.remote.origin.as_deref().map(redact_url);

    toml::to_string_pretty(&shown).context("Failed to render configuration")
}
