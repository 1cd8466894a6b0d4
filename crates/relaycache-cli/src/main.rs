mod cli;
mod commands;
mod context;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};
use context::{BackendPolicy, CacheContext, apply_overrides};
use output::print_error;
use relaycache_core::config::loader::load_config;
use relaycache_core::observability::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&cli, &mut config);
    config.validate()?;

    init_tracing(&config.logging)?;

    if let Commands::Config(args) = &cli.command {
        match args.command {
            ConfigCommands::Show => commands::config::show(&config)?,
        }
        return Ok(ExitCode::SUCCESS);
    }

    let policy = BackendPolicy::for_command(&cli.command);
    let ctx = CacheContext::connect(&config, &cli.headers, policy).await?;

    let report = match &cli.command {
        Commands::Read(args) => commands::cache::read(&ctx, &args.keys).await?,
        Commands::Fetch(args) => commands::cache::fetch(&ctx, &args.keys).await?,
        Commands::ReadFetch(args) => commands::cache::read_fetch(&ctx, &args.keys).await?,
        Commands::Write(args) => {
            commands::cache::write(&ctx, &args.key, &args.value, args.ttl_secs).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Delete(args) => {
            commands::cache::delete(&ctx, &args.key).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Config(_) => return Ok(ExitCode::SUCCESS),
    };

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
