// ABOUTME: Upstream identity provider abstraction consumed by the authorization flow and tools
// ABOUTME: Defines the client trait, its error type, and the user and repository shapes it returns
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Upstream Identity Provider
//!
//! The authorization flow and the repository tools talk to the upstream provider
//! only through [`UpstreamIdentityClient`]. Production wires in [`GitHubClient`];
//! tests substitute an in-process fake.

/// GitHub implementation over `reqwest`
pub mod github;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use github::GitHubClient;

use crate::store::UpstreamToken;

/// Failures talking to the upstream provider
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The OAuth endpoint answered with an error body
    #[error("github oauth error: {error} - {description}")]
    OAuth {
        /// OAuth error code
        error: String,
        /// OAuth error description
        description: String,
    },
    /// The REST API answered with a non-success status
    #[error("github api error: {status} - {body}")]
    Api {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },
    /// Transport failure
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// A successful response could not be decoded
    #[error("invalid upstream response: {0}")]
    Decode(String),
}

/// Authenticated upstream user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamUser {
    /// Numeric user id
    pub id: i64,
    /// Login handle
    pub login: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Public email
    #[serde(default)]
    pub email: Option<String>,
}

/// Repository summary returned by listing and search endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    /// Short name
    pub name: String,
    /// `owner/name`
    pub full_name: String,
    /// Archived repositories are excluded from team scans
    #[serde(default)]
    pub archived: bool,
    /// Forks are excluded from team scans
    #[serde(default)]
    pub fork: bool,
    /// Visibility
    #[serde(default)]
    pub private: bool,
}

impl RepositorySummary {
    /// Neither archived nor a fork
    #[must_use]
    pub const fn is_active_source(&self) -> bool {
        !self.archived && !self.fork
    }
}

/// Narrow interface to the upstream identity provider
#[async_trait]
pub trait UpstreamIdentityClient: Send + Sync {
    /// Exchange an upstream authorization code for an upstream token
    async fn exchange_code(&self, code: &str) -> Result<UpstreamToken, UpstreamError>;

    /// Exchange an upstream refresh token for a new upstream token pair
    async fn refresh_token(&self, refresh_token: &str) -> Result<UpstreamToken, UpstreamError>;

    /// Fetch the user the access token belongs to
    async fn get_user(&self, access_token: &str) -> Result<UpstreamUser, UpstreamError>;

    /// Whether the user belongs to `org` (case-insensitive)
    async fn check_org_membership(
        &self,
        access_token: &str,
        org: &str,
    ) -> Result<bool, UpstreamError>;

    /// Whether `path` exists in `owner/repo`
    async fn repo_file_exists(
        &self,
        access_token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<bool, UpstreamError>;

    /// Number of entries in directory `path`; zero when it does not exist
    async fn directory_count(
        &self,
        access_token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<usize, UpstreamError>;

    /// Active (non-archived, non-fork) repositories of a team
    async fn list_team_repos(
        &self,
        access_token: &str,
        org: &str,
        team_slug: &str,
    ) -> Result<Vec<RepositorySummary>, UpstreamError>;

    /// Active repositories in `org` whose name matches `prefix`
    async fn search_repos_by_prefix(
        &self,
        access_token: &str,
        org: &str,
        prefix: &str,
    ) -> Result<Vec<RepositorySummary>, UpstreamError>;
}
