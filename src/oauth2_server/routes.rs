// ABOUTME: OAuth 2.0 HTTP route handlers for the axum web framework
// ABOUTME: Provides discovery metadata, client registration, authorization, callback and token endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! OAuth 2.0 server routes
//!
//! Thin adapters: each handler decodes its input, calls the
//! [`OAuth2AuthorizationServer`](super::OAuth2AuthorizationServer) and frames
//! the result. OAuth failures render as `{error, error_description}`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::models::{
    AuthorizationServerMetadata, AuthorizeRequest, CallbackRequest, ClientRegistrationRequest,
    OAuth2Error, ProtectedResourceMetadata, TokenRequest,
};
use crate::constants::paths;
use crate::mcp::ServerResources;

/// OAuth 2.0 routes implementation
pub struct OAuth2Routes;

impl OAuth2Routes {
    /// Create all OAuth 2.0 routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let protected_resource_for_mcp = format!("{}{}", paths::PROTECTED_RESOURCE_METADATA, paths::MCP);

        Router::new()
            .route(
                paths::AUTHORIZATION_SERVER_METADATA,
                get(Self::handle_authorization_server_metadata),
            )
            .route(
                paths::PROTECTED_RESOURCE_METADATA,
                get(Self::handle_protected_resource_metadata),
            )
            .route(
                &protected_resource_for_mcp,
                get(Self::handle_protected_resource_metadata),
            )
            .route(paths::REGISTER, post(Self::handle_register))
            .route(paths::AUTHORIZE, get(Self::handle_authorize))
            .route(paths::CALLBACK, get(Self::handle_callback))
            .route(paths::TOKEN, post(Self::handle_token))
            .with_state(resources)
    }

    /// Handle authorization server metadata (RFC 8414)
    async fn handle_authorization_server_metadata(
        State(resources): State<Arc<ServerResources>>,
    ) -> Json<AuthorizationServerMetadata> {
        Json(AuthorizationServerMetadata::for_issuer(
            &resources.config.base_url,
        ))
    }

    /// Handle protected resource metadata
    async fn handle_protected_resource_metadata(
        State(resources): State<Arc<ServerResources>>,
    ) -> Json<ProtectedResourceMetadata> {
        Json(ProtectedResourceMetadata::for_issuer(
            &resources.config.base_url,
        ))
    }

    /// Handle client registration (POST /register)
    async fn handle_register(
        State(resources): State<Arc<ServerResources>>,
        body: Bytes,
    ) -> Response {
        let request: ClientRegistrationRequest = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("Rejecting registration body: {}", e);
                return OAuth2Error::invalid_client_metadata("Failed to parse request body")
                    .into_response();
            }
        };

        match resources
            .oauth2_server
            .client_manager()
            .register_client(request)
            .await
        {
            Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
            Err(error) => error.into_response(),
        }
    }

    /// Handle authorization request (GET /oauth/authorize)
    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        Query(request): Query<AuthorizeRequest>,
    ) -> Response {
        match resources.oauth2_server.authorize(request).await {
            Ok(location) => found(&location),
            Err(error) => error.into_response(),
        }
    }

    /// Handle the upstream redirect (GET /oauth/callback)
    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        Query(request): Query<CallbackRequest>,
    ) -> Response {
        match resources.oauth2_server.callback(request).await {
            Ok(location) => found(&location),
            Err(error) => error.into_response(),
        }
    }

    /// Handle token exchange (POST /oauth/token)
    async fn handle_token(State(resources): State<Arc<ServerResources>>, body: Bytes) -> Response {
        let request: TokenRequest = match serde_urlencoded::from_bytes(&body) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("Rejecting token request body: {}", e);
                return OAuth2Error::invalid_request("Failed to parse form").into_response();
            }
        };

        match resources.oauth2_server.token(request).await {
            Ok(response) => {
                let mut response = Json(response).into_response();
                response
                    .headers_mut()
                    .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
                response
            }
            Err(error) => error.into_response(),
        }
    }
}

/// 302 Found to `location` (`Redirect::to` answers 303)
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(e) => {
            tracing::error!("Redirect location is not a valid header value: {}", e);
            OAuth2Error::server_error("Failed to build redirect").into_response()
        }
    }
}
