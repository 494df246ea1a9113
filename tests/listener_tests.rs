//! Integration tests for running the binary when the scrape port is taken.

use std::net::TcpListener;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// Helper to get the binary path
fn binary_path() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_github-rate-limit-exporter"))
}

#[test]
fn test_polling_continues_when_port_is_taken() {
    let occupied = TcpListener::bind("127.0.0.1:0").expect("Failed to bind test port");
    let port = occupied.local_addr().unwrap().port().to_string();

    let mut child = Command::new(binary_path())
        .args([
            "--no-config",
            "--bind",
            "127.0.0.1",
            "--port",
            &port,
            "--poll-interval",
            "1",
            "--api-url",
            "http://127.0.0.1:1",
            "--timeout",
            "1",
        ])
        .env_remove("GH_TOKEN")
        .env_remove("GITHUB_API_URL")
        .env("GITHUB_TOKEN", "ghp_example")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start exporter");

    thread::sleep(Duration::from_secs(3));
    let still_running = child.try_wait().expect("Failed to query exporter").is_none();

    child.kill().expect("Failed to stop exporter");
    let output = child.wait_with_output().expect("Failed to collect output");
    drop(occupied);

    let logs = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(still_running, "exporter exited early, logs: {}", logs);
    assert!(
        logs.contains("Failed to start server"),
        "missing listener failure, logs: {}",
        logs
    );
    assert!(
        logs.matches("Failed to check rate limit").count() >= 2,
        "expected repeated poll attempts, logs: {}",
        logs
    );
}
