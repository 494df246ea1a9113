//! Metrics endpoint handler for Prometheus scraping.
//!
//! Serves the current contents of the [`MetricsSink`](crate::metrics::MetricsSink).
//! Scrapes never trigger a GitHub request; they read whatever the poller
//! stored last.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::TEXT_FORMAT;
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    let start = Instant::now();

    let body = state.sink.encode().map_err(|e| {
        error!("Failed to encode Prometheus metrics: {}", e);
        MetricsError::EncodingFailed
    })?;

    debug!(
        "Metrics request completed: {} bytes, {:.3}ms",
        body.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body))
}
