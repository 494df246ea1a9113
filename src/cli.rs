//! CLI arguments for github-rate-limit-exporter.
//!
//! This module defines the command-line interface using the clap library.
//! Options that are commonly injected by the environment (token, API URL)
//! can also be supplied through environment variables.

use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "github-rate-limit-exporter",
    about = "Prometheus exporter for GitHub API rate limits",
    long_about = "Prometheus exporter for GitHub API rate limits.\n\n\
                  Polls the GitHub /rate_limit endpoint on a fixed interval and exposes \
                  limit, remaining and reset per resource plus the expiry of the \
                  personal access token as Prometheus gauges.",
    version,
    propagate_version = true
)]
pub struct Args {
    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Seconds between rate limit polls
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL")]
    pub api_url: Option<String>,

    /// GitHub token used to query the rate limit
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// HTTP timeout for GitHub requests in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}
