// ABOUTME: Shared test helpers and utilities for integration tests
// ABOUTME: Exports the axum request driver, the mock upstream and resource builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(dead_code)]

pub mod axum_test;
pub mod mock_upstream;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mcp_oauth_bridge::config::ServerConfig;
use mcp_oauth_bridge::mcp::ServerResources;
use mcp_oauth_bridge::store::{AccessTokenRecord, UpstreamToken, UserIdentity};

use mock_upstream::MockUpstream;

/// Base URL every test configuration uses
pub const TEST_BASE_URL: &str = "http://localhost:8080";

/// Configuration suitable for in-process tests
pub fn test_config() -> ServerConfig {
    ServerConfig {
        base_url: TEST_BASE_URL.to_owned(),
        keepalive_interval: Duration::from_millis(100),
        reaper_interval: Duration::from_secs(3600),
        upstream: mcp_oauth_bridge::config::UpstreamOAuthConfig {
            client_id: "upstream-client".to_owned(),
            client_secret: "upstream-secret".to_owned(),
        },
        ..ServerConfig::default()
    }
}

/// Resources over a default mock upstream
pub fn test_resources() -> (Arc<ServerResources>, Arc<MockUpstream>) {
    test_resources_with(test_config(), MockUpstream::new())
}

/// Resources over the given configuration and mock
pub fn test_resources_with(
    config: ServerConfig,
    upstream: MockUpstream,
) -> (Arc<ServerResources>, Arc<MockUpstream>) {
    let upstream = Arc::new(upstream);
    let resources = Arc::new(ServerResources::new(config, upstream.clone()));
    (resources, upstream)
}

/// Store a bearer token for `login` and return it
pub async fn issue_access_token(resources: &ServerResources, login: &str) -> String {
    let token = format!("test-access-{login}");
    resources
        .store
        .access_tokens()
        .save(
            token.clone(),
            AccessTokenRecord {
                upstream: UpstreamToken {
                    access_token: format!("gho_{login}"),
                    refresh_token: None,
                    expires_at: Utc::now() + chrono::Duration::hours(8),
                },
                user: UserIdentity {
                    login: login.to_owned(),
                    id: 42,
                },
                expires_at: Utc::now() + chrono::Duration::hours(1),
            },
        )
        .await;
    token
}
