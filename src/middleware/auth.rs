// ABOUTME: Bearer authentication middleware for the MCP endpoint
// ABOUTME: Resolves issued access tokens to a user context or answers 401 with resource metadata
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::constants::paths;
use crate::errors::{AppError, AppResult};
use crate::logging::{token_prefix, AppLogger};
use crate::mcp::{ServerResources, UserContext};
use crate::middleware::tracing::request_id;
use crate::store::CredentialStore;

/// Middleware for `MCP` bearer authentication
#[derive(Clone)]
pub struct McpAuthMiddleware {
    store: Arc<CredentialStore>,
    resource_metadata_url: String,
}

impl McpAuthMiddleware {
    /// Create new `MCP` auth middleware
    #[must_use]
    pub fn new(store: Arc<CredentialStore>, base_url: &str) -> Self {
        Self {
            store,
            resource_metadata_url: format!("{base_url}{}", paths::PROTECTED_RESOURCE_METADATA),
        }
    }

    /// Authenticate a request from its `Authorization` header
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` when the header is missing or not a bearer token, and
    /// `AuthInvalid` when the token is unknown or expired
    pub async fn authenticate_request(&self, headers: &HeaderMap) -> AppResult<UserContext> {
        let Some(auth_header) = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
        else {
            tracing::debug!("Authentication failed: Missing authorization header");
            return Err(AppError::auth_required());
        };

        let Some(token) = bearer_token(auth_header) else {
            tracing::debug!("Authentication failed: Authorization header is not a bearer token");
            return Err(AppError::auth_required());
        };

        // Security: only a short prefix of the token is ever logged
        let Some(record) = self.store.access_tokens().get(token).await else {
            AppLogger::log_auth_event(
                "unknown",
                "bearer_rejected",
                false,
                Some(token_prefix(token)),
            );
            return Err(AppError::auth_invalid("Invalid or expired access token"));
        };

        let user = UserContext::from_access_token(&record);
        tracing::debug!(user = %user.login, "Bearer authentication successful");
        Ok(user)
    }

    /// 401 response carrying the protected-resource metadata pointer
    #[must_use]
    pub fn unauthorized(&self, error: AppError) -> Response {
        let challenge = format!("Bearer resource_metadata=\"{}\"", self.resource_metadata_url);
        let mut response = error.into_response();
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

/// Extract the token from `Bearer <token>`, scheme matched case-insensitively
fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// axum middleware attaching the caller's [`UserContext`] as a request extension
pub async fn require_bearer(
    State(resources): State<Arc<ServerResources>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth = &resources.auth_middleware;
    match auth.authenticate_request(request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(error) => auth.unauthorized(error.with_request_id(request_id(&request))),
    }
}
