//! GitHub API access for the exporter.
//!
//! This module provides the REST client that queries `/rate_limit`, the
//! resource categories GitHub reports on, and parsing for the token expiry
//! header returned alongside.

pub mod client;
pub mod expiry;

pub use client::{
    GitHubClient, GitHubError, GitHubSettings, Rate, RateLimitSnapshot, RateLimitSource, Resource,
};
pub use expiry::{parse_token_expiry, ExpiryParseError, TOKEN_EXPIRATION_HEADER};
