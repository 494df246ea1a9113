//! REST client for `GET /rate_limit`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::expiry::TOKEN_EXPIRATION_HEADER;

/// Resource categories reported by the rate limit endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    Core,
    Search,
    Graphql,
    IntegrationManifest,
    SourceImport,
    CodeScanningUpload,
    ActionsRunnerRegistration,
    Scim,
    DependencySnapshots,
    CodeSearch,
    AuditLog,
}

impl Resource {
    pub const ALL: [Resource; 11] = [
        Resource::Core,
        Resource::Search,
        Resource::Graphql,
        Resource::IntegrationManifest,
        Resource::SourceImport,
        Resource::CodeScanningUpload,
        Resource::ActionsRunnerRegistration,
        Resource::Scim,
        Resource::DependencySnapshots,
        Resource::CodeSearch,
        Resource::AuditLog,
    ];

    /// JSON key in the API response, also used as the `resource` label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Core => "core",
            Resource::Search => "search",
            Resource::Graphql => "graphql",
            Resource::IntegrationManifest => "integration_manifest",
            Resource::SourceImport => "source_import",
            Resource::CodeScanningUpload => "code_scanning_upload",
            Resource::ActionsRunnerRegistration => "actions_runner_registration",
            Resource::Scim => "scim",
            Resource::DependencySnapshots => "dependency_snapshots",
            Resource::CodeSearch => "code_search",
            Resource::AuditLog => "audit_log",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limit, remaining calls and reset instant (epoch seconds) for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Rate {
    pub limit: i64,
    pub remaining: i64,
    pub reset: i64,
}

/// One successful rate limit response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub rates: BTreeMap<Resource, Rate>,
    /// Raw value of the token expiry header, if GitHub sent one.
    pub token_expiration: Option<String>,
}

impl RateLimitSnapshot {
    /// Builds a snapshot from the `resources` object of the response body.
    /// Keys that are not a known [`Resource`] are ignored whatever their
    /// shape; a known resource that does not decode as a [`Rate`] is skipped.
    pub fn from_resources(
        mut resources: HashMap<String, serde_json::Value>,
        token_expiration: Option<String>,
    ) -> Self {
        let rates = Resource::ALL
            .iter()
            .filter_map(|r| {
                let value = resources.remove(r.as_str())?;
                match serde_json::from_value::<Rate>(value) {
                    Ok(rate) => Some((*r, rate)),
                    Err(e) => {
                        warn!("Skipping malformed rate for {}: {}", r, e);
                        None
                    }
                }
            })
            .collect();
        Self {
            rates,
            token_expiration,
        }
    }

    pub fn get(&self, resource: Resource) -> Option<&Rate> {
        self.rates.get(&resource)
    }
}

#[derive(Deserialize)]
struct RateLimitBody {
    resources: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Errors from querying GitHub.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GitHub responded with {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),
}

/// Source of rate limit snapshots. Implemented by [`GitHubClient`] and by
/// stubs in tests.
#[async_trait]
pub trait RateLimitSource: Send + Sync {
    async fn fetch_rate_limits(&self) -> Result<RateLimitSnapshot, GitHubError>;
}

#[async_trait]
impl<T: RateLimitSource + ?Sized> RateLimitSource for Arc<T> {
    async fn fetch_rate_limits(&self) -> Result<RateLimitSnapshot, GitHubError> {
        (**self).fetch_rate_limits().await
    }
}

/// Connection settings for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub api_url: String,
    pub api_version: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub token: String,
}

/// GitHub REST client authenticated with a static token.
pub struct GitHubClient {
    http: Client,
    rate_limit_url: String,
    api_version: String,
    auth: HeaderValue,
}

impl GitHubClient {
    pub fn new(settings: &GitHubSettings) -> Result<Self, GitHubError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.user_agent)
                .map_err(|_| GitHubError::InvalidHeader("user-agent"))?,
        );
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", settings.token))
            .map_err(|_| GitHubError::InvalidHeader("authorization"))?;
        auth.set_sensitive(true);

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(settings.timeout)
            .use_rustls_tls()
            .build()?;

        Ok(Self {
            http,
            rate_limit_url: format!("{}/rate_limit", settings.api_url.trim_end_matches('/')),
            api_version: settings.api_version.clone(),
            auth,
        })
    }
}

#[async_trait]
impl RateLimitSource for GitHubClient {
    #[instrument(skip(self), fields(url = %self.rate_limit_url))]
    async fn fetch_rate_limits(&self) -> Result<RateLimitSnapshot, GitHubError> {
        let res = self
            .http
            .get(&self.rate_limit_url)
            .header(AUTHORIZATION, self.auth.clone())
            .header("X-GitHub-Api-Version", &self.api_version)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.message)
                .unwrap_or(text);
            return Err(GitHubError::Status { status, message });
        }

        let token_expiration = res
            .headers()
            .get(TOKEN_EXPIRATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let body: RateLimitBody = res.json().await?;
        debug!(
            "Received rate limits for {} resources",
            body.resources.len()
        );

        Ok(RateLimitSnapshot::from_resources(
            body.resources,
            token_expiration,
        ))
    }
}
