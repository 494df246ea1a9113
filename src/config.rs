//! Configuration management for github-rate-limit-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::cli::{Args, ConfigFormat, LogFormat, LogLevel};
use crate::github::GitHubSettings;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 2112;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_API_VERSION: &str = "2022-11-28";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_user_agent() -> String {
    format!("github-rate-limit-exporter/{}", env!("CARGO_PKG_VERSION"))
}

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,

    // Polling
    #[serde(alias = "poll-interval-secs")]
    pub poll_interval_secs: Option<u64>,

    // GitHub API
    #[serde(alias = "api-url")]
    pub api_url: Option<String>,
    #[serde(alias = "api-version")]
    pub api_version: Option<String>,
    #[serde(alias = "user-agent")]
    pub user_agent: Option<String>,
    #[serde(alias = "timeout-secs")]
    pub timeout_secs: Option<u64>,
    /// Never written back out by --show-config.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
    #[serde(alias = "log-format")]
    pub log_format: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            enable_health: Some(true),
            poll_interval_secs: Some(DEFAULT_POLL_INTERVAL_SECS),
            api_url: Some(DEFAULT_API_URL.to_string()),
            api_version: Some(DEFAULT_API_VERSION.to_string()),
            user_agent: Some(default_user_agent()),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            token: None,
            log_level: Some("info".into()),
            log_format: Some("text".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.poll_interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    /// Settings for the GitHub client. Fails when no token is configured.
    pub fn github_settings(&self) -> anyhow::Result<GitHubSettings> {
        let token = self
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .context("No GitHub token configured (set GITHUB_TOKEN or --token)")?;

        Ok(GitHubSettings {
            api_url: self
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_version: self
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            user_agent: self.user_agent.clone().unwrap_or_else(default_user_agent),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            token,
        })
    }

    /// Effective log level: CLI flag, then config file, then `info`.
    pub fn log_level(&self, args: &Args) -> anyhow::Result<LogLevel> {
        if let Some(level) = args.log_level {
            return Ok(level);
        }
        match self.log_level.as_deref() {
            None => Ok(LogLevel::Info),
            Some(s) => <LogLevel as clap::ValueEnum>::from_str(s, true)
                .map_err(|e| anyhow::anyhow!("Invalid log_level '{}': {}", s, e)),
        }
    }

    /// Effective log format: CLI flag, then config file, then text.
    pub fn log_format(&self, args: &Args) -> anyhow::Result<LogFormat> {
        if let Some(format) = args.log_format {
            return Ok(format);
        }
        match self.log_format.as_deref() {
            None => Ok(LogFormat::Text),
            Some(s) => <LogFormat as clap::ValueEnum>::from_str(s, true)
                .map_err(|e| anyhow::anyhow!("Invalid log_format '{}': {}", s, e)),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.poll_interval_secs == Some(0) {
        bail!("poll_interval_secs must be greater than 0");
    }
    if cfg.timeout_secs == Some(0) {
        bail!("timeout_secs must be greater than 0");
    }

    if let Some(url) = cfg.api_url.as_deref() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("Invalid api_url '{}', expected an http:// or https:// URL", url);
        }
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            bail!("Invalid bind address '{}'", bind);
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        <LogLevel as clap::ValueEnum>::from_str(level, true)
            .map_err(|_| anyhow::anyhow!("Invalid log_level '{}'", level))?;
    }
    if let Some(format) = cfg.log_format.as_deref() {
        <LogFormat as clap::ValueEnum>::from_str(format, true)
            .map_err(|_| anyhow::anyhow!("Invalid log_format '{}', expected 'text' or 'json'", format))?;
    }

    if cfg.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
        bail!("No GitHub token configured (set GITHUB_TOKEN or --token)");
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                bail!("TLS is enabled but neither tls_cert_path nor tls_key_path are set");
            }
            (Some(_), None) => bail!("TLS is enabled but tls_key_path is not set"),
            (None, Some(_)) => bail!("TLS is enabled but tls_cert_path is not set"),
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> anyhow::Result<()> {
    let p = Path::new(path);
    if !p.exists() {
        bail!("TLS {} file not found: {}", what, path);
    }
    match fs::metadata(p) {
        Ok(meta) if meta.len() == 0 => bail!("TLS {} file is empty: {}", what, path),
        Err(e) => bail!("TLS {} file is not readable: {} ({})", what, path, e),
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(interval) = args.poll_interval {
        config.poll_interval_secs = Some(interval);
    }
    if let Some(url) = &args.api_url {
        config.api_url = Some(url.clone());
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = Some(timeout);
    }

    // Token: CLI/GITHUB_TOKEN > config file > GH_TOKEN
    if let Some(token) = &args.token {
        config.token = Some(token.clone());
    }
    if config.token.is_none() {
        config.token = std::env::var("GH_TOKEN").ok();
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{:?}", level).to_lowercase());
    }
    if let Some(format) = args.log_format {
        config.log_format = Some(format!("{:?}", format).to_lowercase());
    }

    if args.disable_health {
        config.enable_health = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Configuration loading with multiple format support.
/// Without an explicit path, the default locations are tried in order.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                bail!("Config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => {
            let defaults = [
                "/etc/github-rate-limit-exporter/config.yaml",
                "/etc/github-rate-limit-exporter/config.yml",
                "/etc/github-rate-limit-exporter/config.json",
                "./github-rate-limit-exporter.yaml",
                "./github-rate-limit-exporter.yml",
                "./github-rate-limit-exporter.json",
            ];
            match defaults.iter().map(PathBuf::from).find(|p| p.exists()) {
                Some(p) => p,
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
    };
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Renders configuration in the requested format
pub fn render_config(config: &Config, format: ConfigFormat) -> anyhow::Result<String> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}
