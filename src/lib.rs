//! GitHub Rate Limit Exporter Library
//!
//! Polls the GitHub `/rate_limit` endpoint on a fixed interval and publishes
//! the values as Prometheus gauges.
//!
//! # Components
//!
//! - [`poller::Poller`]: ticks on an interval, fetches rate limits through a
//!   [`github::RateLimitSource`] and writes them into the sink
//! - [`metrics::MetricsSink`]: owns the registry and the gauges, safe to read
//!   while the poller writes
//! - [`handlers::router`]: axum routes for `/metrics`, `/health` and `/`
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use github_rate_limit_exporter::github::{GitHubClient, GitHubSettings};
//! use github_rate_limit_exporter::health_stats::PollStats;
//! use github_rate_limit_exporter::metrics::MetricsSink;
//! use github_rate_limit_exporter::poller::{stop_channel, Poller};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let settings = GitHubSettings {
//!     api_url: "https://api.github.com".into(),
//!     api_version: "2022-11-28".into(),
//!     user_agent: "demo".into(),
//!     timeout: Duration::from_secs(30),
//!     token: std::env::var("GITHUB_TOKEN")?,
//! };
//! let sink = Arc::new(MetricsSink::new()?);
//! let poller = Poller::new(
//!     GitHubClient::new(&settings)?,
//!     sink.clone(),
//!     Arc::new(PollStats::new()),
//!     Duration::from_secs(60),
//! );
//!
//! let (_stop_tx, stop_rx) = stop_channel();
//! let reason = poller.run(stop_rx).await;
//! println!("stopped: {reason}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod github;
pub mod handlers;
pub mod health_stats;
pub mod metrics;
pub mod poller;
pub mod state;
