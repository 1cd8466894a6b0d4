use std::time::Duration;

use anyhow::Result;
use colored::Colorize;

use crate::context::CacheContext;
use crate::output::{Report, print_report, print_success, render_bytes};

/// Cache-only read. Keys that are not cached are reported as errors.
pub async fn read(ctx: &CacheContext, keys: &[String]) -> Result<Report> {
    let found = ctx.provider.read_multi(keys).await?;

    let mut report = Report::default();
    for (key, value) in found {
        if value.is_empty() {
            report.push_error(key, "not cached");
        } else {
            report.values.insert(key, render_bytes(&value));
        }
    }
    report.errors.sort_by(|a, b| a.key.cmp(&b.key));
    print_report(&report);
    Ok(report)
}

pub async fn fetch(ctx: &CacheContext, keys: &[String]) -> Result<Report> {
    let template = ctx.template()?;
    let (values, error) = ctx.provider.fetch_multi(keys, &template).await.into_parts();

    let report = Report::from_batch(values, error);
    print_report(&report);
    Ok(report)
}

pub async fn read_fetch(ctx: &CacheContext, keys: &[String]) -> Result<Report> {
    let template = ctx.template()?;
    let (values, error) = ctx
        .provider
        .read_fetch_multi(keys, &template)
        .await
        .into_parts();

    let report = Report::from_batch(values, error);
    print_report(&report);
    Ok(report)
}

pub async fn write(ctx: &CacheContext, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
    ctx.provider
        .write(key, value.as_bytes(), Duration::from_secs(ttl_secs))
        .await?;
    print_success(&format!(
        "Wrote {} ({} bytes)",
        ctx.provider.normalize(key).cyan(),
        value.len()
    ));
    Ok(())
}

pub async fn delete(ctx: &CacheContext, key: &str) -> Result<()> {
    ctx.provider.delete(key).await?;
    print_success(&format!("Deleted {}", ctx.provider.normalize(key).cyan()));
    Ok(())
}
