// ABOUTME: End-to-end tests of the authorization code flow with PKCE and refresh rotation
// ABOUTME: Walks authorize, upstream callback, token exchange and refresh through the HTTP router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod helpers;

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use helpers::axum_test::{AxumTestRequest, AxumTestResponse};
use helpers::mock_upstream::{MockUpstream, RefreshBehavior};
use helpers::{test_config, test_resources, test_resources_with, TEST_BASE_URL};
use mcp_oauth_bridge::mcp::ServerResources;
use mcp_oauth_bridge::server::build_router;
use serde_json::{json, Value};
use url::Url;

const LOOPBACK_REDIRECT: &str = "http://127.0.0.1:33418/callback";
// RFC 7636 Appendix B
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

fn query_of(location: &str) -> HashMap<String, String> {
    Url::parse(location)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

async fn register(resources: &Arc<ServerResources>, redirect_uris: &[&str]) -> String {
    let body: Value = AxumTestRequest::post("/register")
        .json(&json!({ "redirect_uris": redirect_uris }))
        .send(build_router(resources))
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    body["client_id"].as_str().unwrap().to_owned()
}

async fn authorize(resources: &Arc<ServerResources>, params: &[(&str, &str)]) -> AxumTestResponse {
    let query = serde_urlencoded::to_string(params).unwrap();
    AxumTestRequest::get(&format!("/oauth/authorize?{query}"))
        .send(build_router(resources))
        .await
}

async fn callback(resources: &Arc<ServerResources>, params: &[(&str, &str)]) -> AxumTestResponse {
    let query = serde_urlencoded::to_string(params).unwrap();
    AxumTestRequest::get(&format!("/oauth/callback?{query}"))
        .send(build_router(resources))
        .await
}

async fn token(resources: &Arc<ServerResources>, form: &[(&str, &str)]) -> AxumTestResponse {
    AxumTestRequest::post("/oauth/token")
        .form(&form)
        .send(build_router(resources))
        .await
}

/// Run authorize and callback, returning the code and state handed to the client
async fn obtain_code(
    resources: &Arc<ServerResources>,
    client_id: &str,
    redirect_uri: &str,
    challenge: Option<&str>,
) -> (String, String) {
    let mut params = vec![
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("state", "client-state-123"),
        ("response_type", "code"),
    ];
    if let Some(challenge) = challenge {
        params.push(("code_challenge", challenge));
        params.push(("code_challenge_method", "S256"));
    }

    let response = authorize(resources, &params)
        .await
        .assert_status(StatusCode::FOUND);
    let upstream_query = query_of(&response.header("location").unwrap());
    let internal_state = upstream_query["state"].clone();

    let response = callback(
        resources,
        &[("code", "upstream-code"), ("state", internal_state.as_str())],
    )
    .await
    .assert_status(StatusCode::FOUND);
    let client_query = query_of(&response.header("location").unwrap());

    (
        client_query["code"].clone(),
        client_query["state"].clone(),
    )
}

async fn exchange_code(
    resources: &Arc<ServerResources>,
    client_id: &str,
    code: &str,
) -> Value {
    token(
        resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", LOOPBACK_REDIRECT),
            ("client_id", client_id),
            ("code_verifier", VERIFIER),
        ],
    )
    .await
    .assert_status(StatusCode::OK)
    .json()
}

#[tokio::test]
async fn test_full_flow_with_pkce_issues_working_bearer() {
    let (resources, upstream) = test_resources();
    let client_id = register(&resources, &[LOOPBACK_REDIRECT]).await;

    let response = authorize(
        &resources,
        &[
            ("client_id", client_id.as_str()),
            ("redirect_uri", LOOPBACK_REDIRECT),
            ("state", "client-state-123"),
            ("code_challenge", CHALLENGE),
            ("code_challenge_method", "S256"),
        ],
    )
    .await
    .assert_status(StatusCode::FOUND);

    let location = response.header("location").unwrap();
    assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
    let upstream_query = query_of(&location);
    assert_eq!(upstream_query["client_id"], "upstream-client");
    assert_eq!(
        upstream_query["redirect_uri"],
        format!("{TEST_BASE_URL}/oauth/callback")
    );
    assert_eq!(upstream_query["scope"], "read:user read:org user:email");
    // The client's own state never travels upstream
    assert_ne!(upstream_query["state"], "client-state-123");

    let response = callback(
        &resources,
        &[("code", "upstream-code"), ("state", upstream_query["state"].as_str())],
    )
    .await
    .assert_status(StatusCode::FOUND);
    let location = response.header("location").unwrap();
    assert!(location.starts_with(LOOPBACK_REDIRECT));
    let client_query = query_of(&location);
    assert_eq!(client_query["state"], "client-state-123");
    assert_eq!(upstream.exchanged_codes(), vec!["upstream-code".to_owned()]);

    let response = token(
        &resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", client_query["code"].as_str()),
            ("redirect_uri", LOOPBACK_REDIRECT),
            ("client_id", client_id.as_str()),
            ("code_verifier", VERIFIER),
        ],
    )
    .await
    .assert_status(StatusCode::OK);
    assert_eq!(response.header("cache-control").as_deref(), Some("no-store"));

    let tokens: Value = response.json();
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 3600);
    assert!(tokens["refresh_token"].is_string());

    let access_token = tokens["access_token"].as_str().unwrap();
    let reply: Value = AxumTestRequest::post("/mcp")
        .bearer(access_token)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": "whoami", "arguments": {}}
        }))
        .send(build_router(&resources))
        .await
        .assert_status(StatusCode::OK)
        .json();
    let text = reply["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("@octocat"));
}

#[tokio::test]
async fn test_unregistered_client_may_authorize() {
    let (resources, _) = test_resources();

    let response = authorize(
        &resources,
        &[
            ("client_id", "unknown"),
            ("redirect_uri", "http://127.0.0.1:5000/cb"),
            ("state", "s"),
        ],
    )
    .await;

    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(resources.store.sessions().count().await, 1);
}

#[tokio::test]
async fn test_unregistered_client_must_supply_redirect_uri() {
    let (resources, _) = test_resources();

    let body: Value = authorize(&resources, &[("client_id", "unknown"), ("state", "s")])
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();

    assert_eq!(body["error"], "invalid_request");
    assert_eq!(
        body["error_description"],
        "Missing required parameter: redirect_uri"
    );
    assert_eq!(resources.store.sessions().count().await, 0);
}

#[tokio::test]
async fn test_registered_client_redirect_must_match() {
    let (resources, _) = test_resources();
    let client_id = register(&resources, &[LOOPBACK_REDIRECT]).await;

    let body: Value = authorize(
        &resources,
        &[
            ("client_id", client_id.as_str()),
            ("redirect_uri", "http://127.0.0.1:9999/other"),
        ],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();

    assert_eq!(body["error"], "invalid_request");
    assert_eq!(resources.store.sessions().count().await, 0);
}

#[tokio::test]
async fn test_registered_client_single_redirect_may_be_omitted() {
    let (resources, _) = test_resources();
    let client_id = register(&resources, &[LOOPBACK_REDIRECT]).await;

    let response = authorize(
        &resources,
        &[("client_id", client_id.as_str()), ("state", "s1")],
    )
    .await
    .assert_status(StatusCode::FOUND);
    let internal_state = query_of(&response.header("location").unwrap())["state"].clone();

    let response = callback(
        &resources,
        &[("code", "upstream-code"), ("state", internal_state.as_str())],
    )
    .await
    .assert_status(StatusCode::FOUND);
    let location = response.header("location").unwrap();
    assert!(location.starts_with(LOOPBACK_REDIRECT));
    let code = query_of(&location)["code"].clone();

    // Omitted at authorize, so it may be omitted at the token endpoint too
    let body: Value = token(
        &resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", client_id.as_str()),
        ],
    )
    .await
    .assert_status(StatusCode::OK)
    .json();
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_redirect_uri_sent_at_authorize_is_required_at_token_exchange() {
    let (resources, _) = test_resources();
    let (code, _) = obtain_code(&resources, "tool", LOOPBACK_REDIRECT, None).await;

    let body: Value = token(
        &resources,
        &[("grant_type", "authorization_code"), ("code", code.as_str())],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();

    assert_eq!(body["error"], "invalid_grant");
    assert_eq!(body["error_description"], "Redirect URI mismatch");
}

#[tokio::test]
async fn test_authorize_requires_client_id() {
    let (resources, _) = test_resources();

    let body: Value = authorize(&resources, &[("redirect_uri", LOOPBACK_REDIRECT)])
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();

    assert_eq!(body["error"], "invalid_request");
    assert_eq!(
        body["error_description"],
        "Missing required parameter: client_id"
    );
}

#[tokio::test]
async fn test_authorize_rejects_plain_pkce() {
    let (resources, _) = test_resources();

    let body: Value = authorize(
        &resources,
        &[
            ("client_id", "tool"),
            ("redirect_uri", LOOPBACK_REDIRECT),
            ("code_challenge", "abc"),
            ("code_challenge_method", "plain"),
        ],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();

    assert_eq!(
        body["error_description"],
        "Only S256 code challenge method supported"
    );
}

#[tokio::test]
async fn test_wrong_verifier_fails_and_burns_code() {
    let (resources, _) = test_resources();
    let client_id = register(&resources, &[LOOPBACK_REDIRECT]).await;
    let (code, _) = obtain_code(&resources, &client_id, LOOPBACK_REDIRECT, Some(CHALLENGE)).await;

    let body: Value = token(
        &resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", LOOPBACK_REDIRECT),
            ("code_verifier", "not-the-verifier"),
        ],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();
    assert_eq!(body["error"], "invalid_grant");

    let body: Value = token(
        &resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", LOOPBACK_REDIRECT),
            ("code_verifier", VERIFIER),
        ],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_missing_verifier_fails_when_challenge_recorded() {
    let (resources, _) = test_resources();
    let (code, _) = obtain_code(&resources, "tool", LOOPBACK_REDIRECT, Some(CHALLENGE)).await;

    let body: Value = token(
        &resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", LOOPBACK_REDIRECT),
        ],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();
    assert_eq!(body["error"], "invalid_grant");
    assert_eq!(body["error_description"], "PKCE verification failed");
}

#[tokio::test]
async fn test_redirect_uri_mismatch_at_token_exchange() {
    let (resources, _) = test_resources();
    let (code, _) = obtain_code(&resources, "tool", LOOPBACK_REDIRECT, None).await;

    let body: Value = token(
        &resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", "http://127.0.0.1:33418/elsewhere"),
        ],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();

    assert_eq!(body["error"], "invalid_grant");
    assert_eq!(body["error_description"], "Redirect URI mismatch");
}

#[tokio::test]
async fn test_code_is_single_use() {
    let (resources, _) = test_resources();
    let (code, _) = obtain_code(&resources, "tool", LOOPBACK_REDIRECT, Some(CHALLENGE)).await;

    exchange_code(&resources, "tool", &code).await;

    let body: Value = token(
        &resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", LOOPBACK_REDIRECT),
            ("code_verifier", VERIFIER),
        ],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_client_id_mismatch_is_invalid_client() {
    let (resources, _) = test_resources();
    let (code, _) = obtain_code(&resources, "tool-a", LOOPBACK_REDIRECT, None).await;

    let body: Value = token(
        &resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", LOOPBACK_REDIRECT),
            ("client_id", "tool-b"),
        ],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn test_unsupported_grant_type() {
    let (resources, _) = test_resources();

    let body: Value = token(&resources, &[("grant_type", "client_credentials")])
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_malformed_token_form_is_invalid_request() {
    let (resources, _) = test_resources();

    let body: Value = AxumTestRequest::post("/oauth/token")
        .header("content-type", "application/x-www-form-urlencoded")
        .body("grant_type=refresh_token&grant_type=authorization_code")
        .send(build_router(&resources))
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();

    assert_eq!(body["error"], "invalid_request");
    assert_eq!(body["error_description"], "Failed to parse form");
}

#[tokio::test]
async fn test_callback_reports_upstream_error() {
    let (resources, _) = test_resources();

    let body: Value = callback(
        &resources,
        &[
            ("error", "access_denied"),
            ("error_description", "The user has denied your application access."),
        ],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();

    assert_eq!(body["error"], "invalid_request");
    assert!(body["error_description"]
        .as_str()
        .unwrap()
        .starts_with("GitHub OAuth error: access_denied"));
}

#[tokio::test]
async fn test_callback_state_is_single_use() {
    let (resources, _) = test_resources();

    let response = authorize(
        &resources,
        &[("client_id", "tool"), ("redirect_uri", LOOPBACK_REDIRECT)],
    )
    .await;
    let internal_state = query_of(&response.header("location").unwrap())["state"].clone();

    callback(&resources, &[("code", "c1"), ("state", internal_state.as_str())])
        .await
        .assert_status(StatusCode::FOUND);

    let body: Value = callback(&resources, &[("code", "c2"), ("state", internal_state.as_str())])
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(body["error_description"], "Invalid or expired state");
}

#[tokio::test]
async fn test_callback_unknown_state() {
    let (resources, upstream) = test_resources();

    callback(&resources, &[("code", "c"), ("state", "forged")])
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert!(upstream.exchanged_codes().is_empty());
}

#[tokio::test]
async fn test_callback_upstream_exchange_failure_is_server_error() {
    let (resources, _) =
        test_resources_with(test_config(), MockUpstream::new().failing_exchange());

    let response = authorize(
        &resources,
        &[("client_id", "tool"), ("redirect_uri", LOOPBACK_REDIRECT)],
    )
    .await;
    let internal_state = query_of(&response.header("location").unwrap())["state"].clone();

    let body: Value = callback(&resources, &[("code", "c"), ("state", internal_state.as_str())])
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .json();
    assert_eq!(body["error"], "server_error");
    // Upstream detail stays in the logs
    assert!(!body["error_description"]
        .as_str()
        .unwrap()
        .contains("bad_verification_code"));
}

#[tokio::test]
async fn test_org_policy_denies_non_members() {
    let mut config = test_config();
    config.allowed_organization = Some("acme".to_owned());
    let (resources, _) =
        test_resources_with(config, MockUpstream::new().with_org_membership(false));

    let response = authorize(
        &resources,
        &[("client_id", "tool"), ("redirect_uri", LOOPBACK_REDIRECT)],
    )
    .await;
    let internal_state = query_of(&response.header("location").unwrap())["state"].clone();

    let body: Value = callback(&resources, &[("code", "c"), ("state", internal_state.as_str())])
        .await
        .assert_status(StatusCode::FORBIDDEN)
        .json();
    assert_eq!(body["error"], "access_denied");
    assert_eq!(
        body["error_description"],
        "Access denied: You must be a member of the acme organization"
    );
    assert_eq!(resources.store.authorization_codes().count().await, 0);
}

#[tokio::test]
async fn test_org_policy_admits_members() {
    let mut config = test_config();
    config.allowed_organization = Some("acme".to_owned());
    let (resources, _) = test_resources_with(config, MockUpstream::new());

    let (code, state) = obtain_code(&resources, "tool", LOOPBACK_REDIRECT, None).await;
    assert!(!code.is_empty());
    assert_eq!(state, "client-state-123");
}

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let (resources, upstream) = test_resources();
    let (code, _) = obtain_code(&resources, "tool", LOOPBACK_REDIRECT, Some(CHALLENGE)).await;
    let first = exchange_code(&resources, "tool", &code).await;
    let old_refresh = first["refresh_token"].as_str().unwrap().to_owned();

    let second: Value = token(
        &resources,
        &[("grant_type", "refresh_token"), ("refresh_token", old_refresh.as_str())],
    )
    .await
    .assert_status(StatusCode::OK)
    .json();
    let new_refresh = second["refresh_token"].as_str().unwrap().to_owned();

    assert_ne!(new_refresh, old_refresh);
    assert_ne!(second["access_token"], first["access_token"]);
    assert_eq!(upstream.refresh_calls(), 1);
    assert!(resources.store.refresh_tokens().get(&old_refresh).await.is_none());
    assert!(resources.store.refresh_tokens().get(&new_refresh).await.is_some());

    // The old token is spent
    let body: Value = token(
        &resources,
        &[("grant_type", "refresh_token"), ("refresh_token", old_refresh.as_str())],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();
    assert_eq!(body["error"], "invalid_grant");

    // The new one works
    token(
        &resources,
        &[("grant_type", "refresh_token"), ("refresh_token", new_refresh.as_str())],
    )
    .await
    .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rejected_upstream_is_invalid_grant() {
    let (resources, upstream) = test_resources();
    let (code, _) = obtain_code(&resources, "tool", LOOPBACK_REDIRECT, None).await;
    let tokens: Value = token(
        &resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", LOOPBACK_REDIRECT),
        ],
    )
    .await
    .json();
    let refresh = tokens["refresh_token"].as_str().unwrap().to_owned();

    upstream.set_refresh_behavior(RefreshBehavior::Reject);
    let body: Value = token(
        &resources,
        &[("grant_type", "refresh_token"), ("refresh_token", refresh.as_str())],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();

    assert_eq!(body["error"], "invalid_grant");
    assert!(resources.store.refresh_tokens().get(&refresh).await.is_none());
}

#[tokio::test]
async fn test_refresh_transient_failure_keeps_token_usable() {
    let (resources, upstream) = test_resources();
    let (code, _) = obtain_code(&resources, "tool", LOOPBACK_REDIRECT, None).await;
    let tokens: Value = token(
        &resources,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", LOOPBACK_REDIRECT),
        ],
    )
    .await
    .json();
    let refresh = tokens["refresh_token"].as_str().unwrap().to_owned();

    upstream.set_refresh_behavior(RefreshBehavior::Unavailable);
    let body: Value = token(
        &resources,
        &[("grant_type", "refresh_token"), ("refresh_token", refresh.as_str())],
    )
    .await
    .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
    .json();
    assert_eq!(body["error"], "server_error");

    upstream.set_refresh_behavior(RefreshBehavior::Succeed);
    token(
        &resources,
        &[("grant_type", "refresh_token"), ("refresh_token", refresh.as_str())],
    )
    .await
    .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_refresh_token() {
    let (resources, upstream) = test_resources();

    let body: Value = token(
        &resources,
        &[("grant_type", "refresh_token"), ("refresh_token", "nope")],
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST)
    .json();

    assert_eq!(body["error"], "invalid_grant");
    assert_eq!(upstream.refresh_calls(), 0);
}
