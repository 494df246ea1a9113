//! github-rate-limit-exporter
//!
//! Prometheus exporter for GitHub API rate limits with tracing logging.
//! This is the main entry point that initializes the server and the poll loop.

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

use github_rate_limit_exporter::cli::{Args, LogFormat, LogLevel};
use github_rate_limit_exporter::config::{
    render_config, resolve_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT,
};
use github_rate_limit_exporter::github::GitHubClient;
use github_rate_limit_exporter::handlers;
use github_rate_limit_exporter::health_stats::PollStats;
use github_rate_limit_exporter::metrics::MetricsSink;
use github_rate_limit_exporter::poller::{
    stop_channel, wait_for_stop, Poller, StopReason, StopSignal,
};
use github_rate_limit_exporter::state::{AppState, SharedState};

/// Grace period for in-flight scrapes on TLS shutdown.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Initializes tracing logging subsystem with configured level and format.
fn setup_logging(config: &Config, args: &Args) -> anyhow::Result<()> {
    let level = match config.log_level(args)? {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    match config.log_format(args)? {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
    }
    .context("Failed to set tracing subscriber")?;

    info!("Logging initialized with level: {}", level);
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() -> StopReason {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            StopReason::Interrupt
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
            StopReason::Terminate
        }
    }
}

/// Serves the HTTP endpoints until `stop` fires. Failures are logged only;
/// polling continues without the scrape endpoint.
async fn serve(state: SharedState, mut stop: StopSignal) {
    let config = state.config.clone();
    let bind_ip = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = match format!("{}:{}", bind_ip, port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid listen address {}:{}: {}", bind_ip, port, e);
            return;
        }
    };

    let app = handlers::router(state);

    if config.enable_tls.unwrap_or(false) {
        let (Some(cert_path), Some(key_path)) =
            (config.tls_cert_path.as_ref(), config.tls_key_path.as_ref())
        else {
            error!("TLS enabled without certificate and key paths");
            return;
        };

        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = match RustlsConfig::from_pem_file(cert_path, key_path).await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load TLS configuration: {}", e);
                return;
            }
        };

        let handle = axum_server::Handle::new();
        let shutdown = handle.clone();
        tokio::spawn(async move {
            wait_for_stop(&mut stop).await;
            shutdown.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
        });

        info!("Starting server on https://{}", addr);
        if let Err(e) = axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
        {
            error!("Server error: {}", e);
        }
    } else {
        let listener = match TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to start server on {}: {}", addr, e);
                return;
            }
        };

        info!("Starting server on http://{}", addr);
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                wait_for_stop(&mut stop).await;
            })
            .await;
        if let Err(e) = result {
            error!("Server error: {}", e);
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    if args.check_config {
        if let Err(e) = validate_effective_config(&config) {
            eprintln!("❌ Configuration invalid: {:#}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        println!("{}", render_config(&config, args.config_format)?);
        return Ok(());
    }

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {:#}", e);
        std::process::exit(1);
    }

    setup_logging(&config, &args)?;

    info!("Starting github-rate-limit-exporter");

    let client = GitHubClient::new(&config.github_settings()?)
        .context("Failed to build GitHub client")?;
    let sink = Arc::new(MetricsSink::new().context("Failed to register metrics")?);
    let stats = Arc::new(PollStats::new());
    let config = Arc::new(config);

    let state = Arc::new(AppState::new(sink.clone(), stats.clone(), config.clone()));
    let (stop_tx, stop_rx) = stop_channel();

    let server = tokio::spawn(serve(state, stop_rx.clone()));

    tokio::spawn(async move {
        let reason = shutdown_signal().await;
        // Receivers may already be gone if everything else exited.
        let _ = stop_tx.send(Some(reason));
    });

    let poller = Poller::new(client, sink, stats, config.poll_interval());
    let reason = poller.run(stop_rx).await;

    if let Err(e) = server.await {
        error!("Server task failed: {}", e);
    }

    info!("github-rate-limit-exporter stopped gracefully ({})", reason);
    Ok(())
}
