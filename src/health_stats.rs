//! Poll health statistics for the exporter.
//!
//! This module tracks the outcome of rate limit polls so the `/health`
//! endpoint can report whether the exporter is currently able to talk to
//! GitHub.

use chrono::{DateTime, Utc};
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock as StdRwLock;
use std::time::Instant;

/// Counters and last-outcome details for the poll loop.
pub struct PollStats {
    pub polls_total: AtomicU64,
    pub poll_success_count: AtomicU64,
    pub poll_failure_count: AtomicU64,
    last_poll_ok: AtomicBool,
    pub start_time: Instant,
    last_success: StdRwLock<Option<DateTime<Utc>>>,
    last_error: StdRwLock<Option<String>>,
}

impl Default for PollStats {
    fn default() -> Self {
        Self {
            polls_total: AtomicU64::new(0),
            poll_success_count: AtomicU64::new(0),
            poll_failure_count: AtomicU64::new(0),
            last_poll_ok: AtomicBool::new(false),
            start_time: Instant::now(),
            last_success: StdRwLock::new(None),
            last_error: StdRwLock::new(None),
        }
    }
}

impl PollStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_success(&self) {
        self.polls_total.fetch_add(1, Ordering::Relaxed);
        self.poll_success_count.fetch_add(1, Ordering::Relaxed);
        self.last_poll_ok.store(true, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_success.write() {
            *guard = Some(Utc::now());
        }
    }

    pub fn record_failure(&self, error: &str) {
        self.polls_total.fetch_add(1, Ordering::Relaxed);
        self.poll_failure_count.fetch_add(1, Ordering::Relaxed);
        self.last_poll_ok.store(false, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_error.write() {
            *guard = Some(error.to_string());
        }
    }

    /// True when the most recent poll succeeded.
    pub fn is_healthy(&self) -> bool {
        self.last_poll_ok.load(Ordering::Relaxed)
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success.read().ok().and_then(|guard| *guard)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().ok().and_then(|guard| guard.clone())
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_success_rate(&self) -> f64 {
        let success = self.poll_success_count.load(Ordering::Relaxed);
        let failure = self.poll_failure_count.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn render_table(&self) -> String {
        let left_col = 22usize;
        let last_success = self
            .last_success()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let last_error = self.last_error().unwrap_or_else(|| "none".to_string());

        let mut out = String::new();
        writeln!(out, "POLL STATISTICS").ok();
        writeln!(out, "===============").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:left$} | {}",
            "polls total",
            self.polls_total.load(Ordering::Relaxed),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {}",
            "successful polls",
            self.poll_success_count.load(Ordering::Relaxed),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {}",
            "failed polls",
            self.poll_failure_count.load(Ordering::Relaxed),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {:.1}%",
            "success rate",
            self.get_success_rate(),
            left = left_col
        )
        .ok();
        writeln!(out, "{:left$} | {}", "last success", last_success, left = left_col).ok();
        writeln!(out, "{:left$} | {}", "last error", last_error, left = left_col).ok();
        out
    }
}
