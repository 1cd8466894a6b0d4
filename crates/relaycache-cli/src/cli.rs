use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "relaycache")]
#[command(about = "relaycache CLI - read, fetch and write through a namespaced cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file (defaults to ./relaycache.toml when present)
    #[arg(short, long, global = true, env = "RELAYCACHE_CONFIG")]
    pub config: Option<String>,

    /// Namespace prefix (overrides cache.prefix)
    #[arg(short, long, global = true)]
    pub prefix: Option<String>,

    /// Remote origin base URL (overrides remote.origin)
    #[arg(short, long, global = true)]
    pub origin: Option<String>,

    /// Extra request header for remote fetches, as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", global = true)]
    pub headers: Vec<String>,

    /// Log level (overrides logging.level)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read keys from the cache only
    Read(KeysArgs),
    /// Fetch keys from the remote origin, bypassing the cache
    Fetch(KeysArgs),
    /// Read keys from the cache, fetching misses from the origin
    ReadFetch(KeysArgs),
    /// Store a value in the cache
    Write(WriteArgs),
    /// Remove a key from the cache
    Delete(DeleteArgs),
    /// Inspect the effective configuration
    Config(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct KeysArgs {
    /// Cache keys, bare (foo) or namespaced (ns:foo)
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct WriteArgs {
    /// Cache key
    pub key: String,
    /// Value to store
    pub value: String,
    /// Expiration in seconds (0 = no expiry)
    #[arg(long, default_value_t = 0)]
    pub ttl_secs: u64,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Cache key
    pub key: String,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the merged configuration as TOML
    Show,
}
