//! Root endpoint handler for the landing page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.stats.get_uptime_seconds();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;

    let interval = state.config.poll_interval().as_secs();
    let health_link = if state.config.enable_health.unwrap_or(true) {
        r#"<li><a href="/health">/health</a> - result of the most recent poll</li>"#
    } else {
        ""
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>GitHub Rate Limit Exporter</title>
</head>
<body>
    <h1>GitHub Rate Limit Exporter</h1>
    <p>Version {version} &middot; uptime {hours}h {minutes}m {seconds}s &middot; polling every {interval}s</p>
    <ul>
        <li><a href="/metrics">/metrics</a> - Prometheus metrics</li>
        {health_link}
    </ul>
</body>
</html>
"#
    ))
}
