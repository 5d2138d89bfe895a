// ABOUTME: In-process upstream identity provider for integration tests
// ABOUTME: Implements the upstream client trait with scripted users, membership, files and repositories
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use mcp_oauth_bridge::store::UpstreamToken;
use mcp_oauth_bridge::upstream::{
    RepositorySummary, UpstreamError, UpstreamIdentityClient, UpstreamUser,
};

/// How the mock answers refresh requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshBehavior {
    /// Issue a fresh upstream pair
    Succeed,
    /// Answer with an OAuth error body (revoked grant)
    Reject,
    /// Answer with a server error
    Unavailable,
}

/// Scripted upstream provider
pub struct MockUpstream {
    user: UpstreamUser,
    org_member: bool,
    fail_exchange: bool,
    refresh_behavior: Mutex<RefreshBehavior>,
    files: HashSet<String>,
    directories: HashMap<String, usize>,
    repos: Vec<RepositorySummary>,
    refresh_calls: AtomicUsize,
    exchanged_codes: Mutex<Vec<String>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self {
            user: UpstreamUser {
                id: 1001,
                login: "octocat".to_owned(),
                name: Some("The Octocat".to_owned()),
                email: None,
            },
            org_member: true,
            fail_exchange: false,
            refresh_behavior: Mutex::new(RefreshBehavior::Succeed),
            files: HashSet::new(),
            directories: HashMap::new(),
            repos: Vec::new(),
            refresh_calls: AtomicUsize::new(0),
            exchanged_codes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_login(mut self, login: &str) -> Self {
        self.user.login = login.to_owned();
        self
    }

    pub const fn with_org_membership(mut self, member: bool) -> Self {
        self.org_member = member;
        self
    }

    pub const fn failing_exchange(mut self) -> Self {
        self.fail_exchange = true;
        self
    }

    /// Files that exist, as `owner/repo/path`
    pub fn with_files(mut self, files: &[&str]) -> Self {
        self.files.extend(files.iter().map(|f| (*f).to_owned()));
        self
    }

    /// Directory entry count, keyed `owner/repo/path`
    pub fn with_directory(mut self, path: &str, count: usize) -> Self {
        self.directories.insert(path.to_owned(), count);
        self
    }

    pub fn with_repos(mut self, repos: Vec<RepositorySummary>) -> Self {
        self.repos = repos;
        self
    }

    pub fn set_refresh_behavior(&self, behavior: RefreshBehavior) {
        *self.refresh_behavior.lock().unwrap() = behavior;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchanged_codes(&self) -> Vec<String> {
        self.exchanged_codes.lock().unwrap().clone()
    }

    pub fn login(&self) -> &str {
        &self.user.login
    }
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

/// Repository summary fixture
pub fn repo(name: &str, archived: bool, fork: bool) -> RepositorySummary {
    RepositorySummary {
        name: name.to_owned(),
        full_name: format!("acme/{name}"),
        archived,
        fork,
        private: false,
    }
}

#[async_trait]
impl UpstreamIdentityClient for MockUpstream {
    async fn exchange_code(&self, code: &str) -> Result<UpstreamToken, UpstreamError> {
        self.exchanged_codes.lock().unwrap().push(code.to_owned());
        if self.fail_exchange {
            return Err(UpstreamError::OAuth {
                error: "bad_verification_code".to_owned(),
                description: "The code passed is incorrect or expired.".to_owned(),
            });
        }
        Ok(UpstreamToken {
            access_token: format!("gho_{code}"),
            refresh_token: Some("ghr_initial".to_owned()),
            expires_at: Utc::now() + Duration::hours(8),
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<UpstreamToken, UpstreamError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let behavior = *self.refresh_behavior.lock().unwrap();
        match behavior {
            RefreshBehavior::Succeed => Ok(UpstreamToken {
                access_token: format!("gho_refreshed_{n}"),
                refresh_token: Some(format!("{refresh_token}_{n}")),
                expires_at: Utc::now() + Duration::hours(8),
            }),
            RefreshBehavior::Reject => Err(UpstreamError::OAuth {
                error: "bad_refresh_token".to_owned(),
                description: "The refresh token passed is incorrect or expired.".to_owned(),
            }),
            RefreshBehavior::Unavailable => Err(UpstreamError::Api {
                status: 503,
                body: "unavailable".to_owned(),
            }),
        }
    }

    async fn get_user(&self, _access_token: &str) -> Result<UpstreamUser, UpstreamError> {
        Ok(self.user.clone())
    }

    async fn check_org_membership(
        &self,
        _access_token: &str,
        _org: &str,
    ) -> Result<bool, UpstreamError> {
        Ok(self.org_member)
    }

    async fn repo_file_exists(
        &self,
        _access_token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<bool, UpstreamError> {
        Ok(self.files.contains(&format!("{owner}/{repo}/{path}")))
    }

    async fn directory_count(
        &self,
        _access_token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<usize, UpstreamError> {
        Ok(self
            .directories
            .get(&format!("{owner}/{repo}/{path}"))
            .copied()
            .unwrap_or(0))
    }

    async fn list_team_repos(
        &self,
        _access_token: &str,
        _org: &str,
        team_slug: &str,
    ) -> Result<Vec<RepositorySummary>, UpstreamError> {
        if team_slug == "missing" {
            return Err(UpstreamError::Api {
                status: 404,
                body: "Not Found".to_owned(),
            });
        }
        Ok(self.repos.clone())
    }

    async fn search_repos_by_prefix(
        &self,
        _access_token: &str,
        _org: &str,
        prefix: &str,
    ) -> Result<Vec<RepositorySummary>, UpstreamError> {
        Ok(self
            .repos
            .iter()
            .filter(|r| r.name.starts_with(prefix))
            .cloned()
            .collect())
    }
}
