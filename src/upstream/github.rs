// ABOUTME: GitHub OAuth and REST client implementing the upstream identity interface
// ABOUTME: Handles code/refresh exchange, user and org lookup, and repository content probes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{RepositorySummary, UpstreamError, UpstreamIdentityClient, UpstreamUser};
use crate::config::UpstreamOAuthConfig;
use crate::constants::{limits, oauth, ttl};
use crate::store::UpstreamToken;

/// Request timeout for upstream calls
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection timeout for upstream calls
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Raw token endpoint body; errors arrive with status 200
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubOrg {
    login: String,
}

#[derive(Debug, Deserialize)]
struct SearchReposResponse {
    #[serde(default)]
    items: Vec<RepositorySummary>,
}

/// GitHub client
pub struct GitHubClient {
    credentials: UpstreamOAuthConfig,
    http: Client,
    api_base_url: String,
    token_url: String,
}

impl GitHubClient {
    /// Create a client against the public GitHub endpoints
    #[must_use]
    pub fn new(credentials: UpstreamOAuthConfig) -> Self {
        Self::with_endpoints(credentials, oauth::GITHUB_API_BASE, oauth::GITHUB_TOKEN_URL)
    }

    /// Create a client against custom endpoints (GitHub Enterprise, local fakes)
    #[must_use]
    pub fn with_endpoints(
        credentials: UpstreamOAuthConfig,
        api_base_url: &str,
        token_url: &str,
    ) -> Self {
        let http = ClientBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("mcp-oauth-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            credentials,
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
            token_url: token_url.to_owned(),
        }
    }

    fn api_get(&self, access_token: &str, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{path}", self.api_base_url))
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", oauth::GITHUB_API_VERSION)
    }

    fn contents_path(owner: &str, repo: &str, path: &str) -> String {
        format!(
            "/repos/{}/{}/contents/{path}",
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        )
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<UpstreamToken, UpstreamError> {
        let response = self
            .http
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        let body: GitHubTokenResponse = decode_json(response).await?;

        if let Some(error) = body.error.filter(|e| !e.is_empty()) {
            return Err(UpstreamError::OAuth {
                error,
                description: body.error_description.unwrap_or_default(),
            });
        }
        if body.access_token.is_empty() {
            return Err(UpstreamError::Decode(
                "token response without access_token".to_owned(),
            ));
        }

        let lifetime = body
            .expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(ttl::UPSTREAM_TOKEN_DEFAULT_SECS);

        Ok(UpstreamToken {
            access_token: body.access_token,
            refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
            expires_at: Utc::now() + ChronoDuration::seconds(lifetime),
        })
    }

    /// Walk a paginated array listing until a short page
    async fn paginate<T, F>(&self, access_token: &str, page_path: F) -> Result<Vec<T>, UpstreamError>
    where
        T: DeserializeOwned,
        F: Fn(usize) -> String + Send + Sync,
    {
        let mut collected = Vec::new();
        let mut page = 1;

        loop {
            let response = self.api_get(access_token, &page_path(page)).send().await?;
            let items: Vec<T> = decode_json(ensure_success(response).await?).await?;
            let fetched = items.len();
            collected.extend(items);

            if fetched < limits::UPSTREAM_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(collected)
    }
}

/// Map non-2xx responses to [`UpstreamError::Api`]
async fn ensure_success(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, UpstreamError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| UpstreamError::Decode(e.to_string()))
}

#[async_trait]
impl UpstreamIdentityClient for GitHubClient {
    async fn exchange_code(&self, code: &str) -> Result<UpstreamToken, UpstreamError> {
        self.post_token_form(&[
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<UpstreamToken, UpstreamError> {
        self.post_token_form(&[
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", oauth::GRANT_REFRESH_TOKEN),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn get_user(&self, access_token: &str) -> Result<UpstreamUser, UpstreamError> {
        let response = self.api_get(access_token, "/user").send().await?;
        decode_json(ensure_success(response).await?).await
    }

    async fn check_org_membership(
        &self,
        access_token: &str,
        org: &str,
    ) -> Result<bool, UpstreamError> {
        let response = self.api_get(access_token, "/user/orgs").send().await?;
        let orgs: Vec<GitHubOrg> = decode_json(ensure_success(response).await?).await?;
        Ok(orgs.iter().any(|o| o.login.eq_ignore_ascii_case(org)))
    }

    async fn repo_file_exists(
        &self,
        access_token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<bool, UpstreamError> {
        let response = self
            .api_get(access_token, &Self::contents_path(owner, repo, path))
            .send()
            .await?;
        Ok(response.status() == StatusCode::OK)
    }

    async fn directory_count(
        &self,
        access_token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<usize, UpstreamError> {
        let response = self
            .api_get(access_token, &Self::contents_path(owner, repo, path))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        let response = ensure_success(response).await?;
        // A file at this path decodes as an object, not a listing
        Ok(decode_json::<Vec<serde_json::Value>>(response)
            .await
            .map_or(0, |entries| entries.len()))
    }

    async fn list_team_repos(
        &self,
        access_token: &str,
        org: &str,
        team_slug: &str,
    ) -> Result<Vec<RepositorySummary>, UpstreamError> {
        let org = urlencoding::encode(org);
        let team = urlencoding::encode(team_slug);
        let repos: Vec<RepositorySummary> = self
            .paginate(access_token, |page| {
                format!(
                    "/orgs/{org}/teams/{team}/repos?per_page={}&page={page}",
                    limits::UPSTREAM_PAGE_SIZE
                )
            })
            .await?;
        Ok(repos
            .into_iter()
            .filter(RepositorySummary::is_active_source)
            .collect())
    }

    async fn search_repos_by_prefix(
        &self,
        access_token: &str,
        org: &str,
        prefix: &str,
    ) -> Result<Vec<RepositorySummary>, UpstreamError> {
        let query = format!("{prefix} in:name org:{org} fork:false archived:false");
        let query = urlencoding::encode(&query).into_owned();
        let mut collected = Vec::new();
        let mut page = 1;

        loop {
            let path = format!(
                "/search/repositories?q={query}&per_page={}&page={page}",
                limits::UPSTREAM_PAGE_SIZE
            );
            let response = self.api_get(access_token, &path).send().await?;
            let result: SearchReposResponse = decode_json(ensure_success(response).await?).await?;
            let fetched = result.items.len();
            collected.extend(result.items);

            if fetched < limits::UPSTREAM_PAGE_SIZE || collected.len() >= limits::MAX_SEARCH_RESULTS
            {
                break;
            }
            page += 1;
        }

        collected.truncate(limits::MAX_SEARCH_RESULTS);
        Ok(collected)
    }
}
