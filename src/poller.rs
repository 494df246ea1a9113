//! Rate limit polling loop.
//!
//! The poller queries GitHub once per tick and writes the result into the
//! shared [`MetricsSink`]. A failed poll is logged and leaves the sink as it
//! was; the next tick is the retry.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};

use crate::github::{parse_token_expiry, ExpiryParseError, GitHubError, RateLimitSource};
use crate::health_stats::PollStats;
use crate::metrics::MetricsSink;

/// Labels for the request duration histogram.
const OPERATION: &str = "rate_limit";
const ACTION: &str = "get";

/// Why the poll loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupt,
    Terminate,
    /// Every stop sender was dropped.
    Closed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Interrupt => "SIGINT",
            StopReason::Terminate => "SIGTERM",
            StopReason::Closed => "stop channel closed",
        };
        f.write_str(s)
    }
}

pub type StopSender = watch::Sender<Option<StopReason>>;
pub type StopSignal = watch::Receiver<Option<StopReason>>;

/// Creates the channel used to cancel the poll loop and the HTTP server.
pub fn stop_channel() -> (StopSender, StopSignal) {
    watch::channel(None)
}

/// Resolves once a stop reason has been sent or the sender is gone.
pub async fn wait_for_stop(stop: &mut StopSignal) -> StopReason {
    match stop.wait_for(Option::is_some).await {
        Ok(reason) => (*reason).unwrap_or(StopReason::Closed),
        Err(_) => StopReason::Closed,
    }
}

/// Errors from a single poll.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to fetch rate limits: {0}")]
    Fetch(#[from] GitHubError),

    #[error("failed to parse token expiry: {0}")]
    TokenExpiry(#[from] ExpiryParseError),
}

/// Periodic rate limit poller.
pub struct Poller<S> {
    source: S,
    sink: Arc<MetricsSink>,
    stats: Arc<PollStats>,
    interval: Duration,
}

impl<S: RateLimitSource> Poller<S> {
    pub fn new(
        source: S,
        sink: Arc<MetricsSink>,
        stats: Arc<PollStats>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            stats,
            interval,
        }
    }

    /// Polls on every tick until `stop` fires. The first tick is immediate.
    pub async fn run(&self, mut stop: StopSignal) -> StopReason {
        info!(
            interval_seconds = self.interval.as_secs_f64(),
            "Starting rate limit check"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                reason = wait_for_stop(&mut stop) => {
                    info!("Rate limit poller stopping ({})", reason);
                    return reason;
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                reason = wait_for_stop(&mut stop) => {
                    info!("Rate limit poller stopping during poll ({})", reason);
                    return reason;
                }
                result = self.poll_once() => {
                    if let Err(e) = result {
                        error!("Failed to check rate limit: {}", e);
                    }
                }
            }
        }
    }

    /// Performs one query and maps it onto the sink.
    ///
    /// Rate values are committed before the token expiry header is parsed; a
    /// malformed header is reported as an error but does not roll them back.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> Result<(), PollError> {
        debug!("Checking rate limit");

        let start = Instant::now();
        let fetched = self.source.fetch_rate_limits().await;
        self.sink
            .observe_request(OPERATION, ACTION, start.elapsed().as_secs_f64());

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_failure(&e.to_string());
                return Err(e.into());
            }
        };

        self.sink.set_last_run_now();
        for (resource, rate) in &snapshot.rates {
            self.sink
                .set_rate(*resource, rate.limit, rate.remaining, rate.reset);
        }
        debug!("Updated {} resource rate limits", snapshot.rates.len());

        if let Some(raw) = snapshot.token_expiration.as_deref() {
            match parse_token_expiry(raw) {
                Ok(expiry) => self.sink.set_token_expiry(expiry.timestamp_millis()),
                Err(e) => {
                    self.record_failure(&e.to_string());
                    return Err(e.into());
                }
            }
        }

        self.stats.record_success();
        Ok(())
    }

    fn record_failure(&self, message: &str) {
        self.sink.record_poll_failure();
        self.stats.record_failure(message);
    }
}
