use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the stoa binary.
#[derive(Debug, Parser)]
#[command(name = "stoa", version, about = "Stoa cache maintenance tool")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "STOA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Check that the configured cache store answers.
    Ping,
    /// Print the raw value stored under a key and whether it decodes.
    Inspect(InspectArgs),
    /// Delete every key of one entity family.
    Flush(FlushArgs),
    /// Delete every key matching a glob.
    Purge(PurgeArgs),
    /// Run the question rename walkthrough against the configured store.
    Demo,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    /// Full cache key, e.g. `questions:slug:intro-to-x`.
    #[arg(value_name = "KEY")]
    pub key: String,
}

#[derive(Debug, Args, Clone)]
pub struct FlushArgs {
    /// Family namespace: users, questions, answers, comments, or attachments.
    #[arg(value_name = "FAMILY")]
    pub family: String,
}

#[derive(Debug, Args, Clone)]
pub struct PurgeArgs {
    /// Redis-style glob (`*`, `?`, `[...]`, backslash escapes).
    #[arg(value_name = "GLOB")]
    pub pattern: String,
}

/// Settings that can be forced from the command line.
#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the cache backend (memory|redis).
    #[arg(long = "cache-backend", value_name = "BACKEND", global = true)]
    pub cache_backend: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL", global = true)]
    pub redis_url: Option<String>,

    /// Override the TTL applied to every key class without its own TTL.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS", global = true)]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the per-operation store timeout.
    #[arg(long = "cache-operation-timeout-ms", value_name = "MILLIS", global = true)]
    pub cache_operation_timeout_ms: Option<u64>,
}
