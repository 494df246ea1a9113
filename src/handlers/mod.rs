//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Poll health endpoint
//! - `/`: Landing page

pub mod health;
pub mod metrics;
pub mod root;

use axum::{routing::get, Router};

use crate::state::SharedState;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;

/// Builds the router serving all endpoints.
pub fn router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler));

    if state.config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    app.with_state(state)
}
