//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that reports whether
//! the most recent rate limit poll succeeded.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let stats = &state.stats;

    let (status, message) = if stats.is_healthy() {
        (StatusCode::OK, "OK")
    } else if stats.last_success().is_none() {
        (StatusCode::SERVICE_UNAVAILABLE, "No successful poll yet")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Last poll failed")
    };

    let uptime_hours = stats.get_uptime_seconds() as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let table = stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\nUptime: {uptime_str}\n\n{table}"),
    )
}
