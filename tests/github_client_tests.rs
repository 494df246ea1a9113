//! Integration tests for the GitHub REST client against a mock API.

use github_rate_limit_exporter::github::{
    GitHubClient, GitHubError, GitHubSettings, Rate, RateLimitSource, Resource,
    TOKEN_EXPIRATION_HEADER,
};
use httpmock::{Method::GET, MockServer};
use serde_json::json;
use std::time::Duration;

fn settings(server: &MockServer) -> GitHubSettings {
    GitHubSettings {
        api_url: server.base_url(),
        api_version: "2022-11-28".into(),
        user_agent: "github-rate-limit-exporter/test".into(),
        timeout: Duration::from_secs(5),
        token: "t0ken".into(),
    }
}

fn rate_limit_body() -> serde_json::Value {
    json!({
        "resources": {
            "core": {"limit": 5000, "used": 1, "remaining": 4999, "reset": 1700000000},
            "search": {"limit": 30, "used": 2, "remaining": 28, "reset": 1700000060},
            "graphql": {"limit": 5000, "used": 0, "remaining": 5000, "reset": 1700003600},
            "code_search": {"limit": 10, "used": 0, "remaining": 10, "reset": 1700000060},
            "audit_log": {"limit": 1750, "used": 0, "remaining": 1750, "reset": 1700003600}
        },
        "rate": {"limit": 5000, "used": 1, "remaining": 4999, "reset": 1700000000}
    })
}

#[tokio::test]
async fn fetches_rates_and_expiry_header() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rate_limit")
                .header("authorization", "Bearer t0ken")
                .header("accept", "application/vnd.github+json")
                .header("x-github-api-version", "2022-11-28");
            then.status(200)
                .header(TOKEN_EXPIRATION_HEADER, "2024-01-02 15:04:05 UTC")
                .json_body(rate_limit_body());
        })
        .await;

    let client = GitHubClient::new(&settings(&server)).unwrap();
    let snapshot = client.fetch_rate_limits().await.unwrap();

    mock.assert_async().await;
    assert_eq!(snapshot.rates.len(), 5);
    assert_eq!(
        snapshot.get(Resource::Core),
        Some(&Rate {
            limit: 5000,
            remaining: 4999,
            reset: 1_700_000_000
        })
    );
    assert_eq!(snapshot.get(Resource::Search).map(|r| r.remaining), Some(28));
    assert_eq!(snapshot.get(Resource::AuditLog).map(|r| r.limit), Some(1750));
    assert_eq!(
        snapshot.token_expiration.as_deref(),
        Some("2024-01-02 15:04:05 UTC")
    );
}

#[tokio::test]
async fn missing_expiry_header_is_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200).json_body(rate_limit_body());
        })
        .await;

    let client = GitHubClient::new(&settings(&server)).unwrap();
    let snapshot = client.fetch_rate_limits().await.unwrap();

    assert!(snapshot.token_expiration.is_none());
}

#[tokio::test]
async fn trailing_slash_in_api_url_is_tolerated() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200).json_body(rate_limit_body());
        })
        .await;

    let mut cfg = settings(&server);
    cfg.api_url.push('/');
    let client = GitHubClient::new(&cfg).unwrap();
    client.fetch_rate_limits().await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn unauthorized_maps_to_status_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(401).json_body(json!({
                "message": "Bad credentials",
                "documentation_url": "https://docs.github.com/rest"
            }));
        })
        .await;

    let client = GitHubClient::new(&settings(&server)).unwrap();
    let err = client.fetch_rate_limits().await.unwrap_err();

    match err {
        GitHubError::Status { status, message } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(message, "Bad credentials");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_body_is_kept_verbatim() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(502).body("upstream exploded");
        })
        .await;

    let client = GitHubClient::new(&settings(&server)).unwrap();
    let err = client.fetch_rate_limits().await.unwrap_err();

    assert!(err.to_string().contains("upstream exploded"), "{err}");
}

#[tokio::test]
async fn malformed_body_is_a_transport_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200).body("{not json");
        })
        .await;

    let client = GitHubClient::new(&settings(&server)).unwrap();
    let err = client.fetch_rate_limits().await.unwrap_err();

    assert!(matches!(err, GitHubError::Transport(_)));
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
    let cfg = GitHubSettings {
        api_url: "http://127.0.0.1:1".into(),
        api_version: "2022-11-28".into(),
        user_agent: "test".into(),
        timeout: Duration::from_secs(2),
        token: "t".into(),
    };
    let client = GitHubClient::new(&cfg).unwrap();
    let err = client.fetch_rate_limits().await.unwrap_err();

    assert!(matches!(err, GitHubError::Transport(_)));
}

#[tokio::test]
async fn body_without_resources_is_a_transport_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200).json_body(json!({}));
        })
        .await;

    let client = GitHubClient::new(&settings(&server)).unwrap();
    let err = client.fetch_rate_limits().await.unwrap_err();

    assert!(matches!(err, GitHubError::Transport(_)));
}

#[tokio::test]
async fn unknown_bucket_shape_keeps_known_rates() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200).json_body(json!({
                "resources": {
                    "core": {"limit": 5000, "used": 1, "remaining": 4999, "reset": 1700000000},
                    "future_bucket": {"limit": 1}
                }
            }));
        })
        .await;

    let client = GitHubClient::new(&settings(&server)).unwrap();
    let snapshot = client.fetch_rate_limits().await.unwrap();

    assert_eq!(snapshot.rates.len(), 1);
    assert_eq!(snapshot.get(Resource::Core).map(|r| r.remaining), Some(4999));
}
