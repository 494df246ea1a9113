//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers. The poller holds its own references to the same sink
//! and statistics.

use std::sync::Arc;

use crate::config::Config;
use crate::health_stats::PollStats;
use crate::metrics::MetricsSink;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Application state shared across requests.
pub struct AppState {
    pub sink: Arc<MetricsSink>,
    pub stats: Arc<PollStats>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(sink: Arc<MetricsSink>, stats: Arc<PollStats>, config: Arc<Config>) -> Self {
        Self {
            sink,
            stats,
            config,
        }
    }
}
