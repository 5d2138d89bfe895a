// ABOUTME: OAuth 2.0 data models for client registration, authorization and token exchange
// ABOUTME: Implements RFC 7591, RFC 8414 and OAuth 2.0 request/response structures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Display, Formatter, Result as FmtResult};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::constants::{oauth, paths};

/// OAuth 2.0 Client Registration Request (RFC 7591)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientRegistrationRequest {
    /// Optional client name for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Redirect URIs for authorization code flow
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Grant types the client can use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<String>>,
    /// Response types the client can use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types: Option<Vec<String>>,
    /// Token endpoint authentication method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
}

/// OAuth 2.0 Client Registration Response (RFC 7591)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistrationResponse {
    /// Unique client identifier
    pub client_id: String,
    /// Client name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Redirect URIs registered for this client
    pub redirect_uris: Vec<String>,
    /// Grant types allowed for this client
    pub grant_types: Vec<String>,
    /// Response types allowed for this client
    pub response_types: Vec<String>,
    /// Always `none`: no client secret is issued
    pub token_endpoint_auth_method: String,
    /// Registration time as a Unix timestamp
    pub client_id_issued_at: i64,
}

/// PKCE code challenge method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceMethod {
    /// SHA-256 transformation (RFC 7636 required method)
    S256,
}

impl PkceMethod {
    /// Returns the string representation for OAuth requests
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => oauth::PKCE_METHOD_S256,
        }
    }

    /// Parse a `code_challenge_method` parameter
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        (value == oauth::PKCE_METHOD_S256).then_some(Self::S256)
    }
}

impl Display for PkceMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// OAuth 2.0 Authorization Request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeRequest {
    /// Client identifier
    pub client_id: Option<String>,
    /// Redirect URI for the final response
    pub redirect_uri: Option<String>,
    /// Client state, echoed back verbatim
    pub state: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method
    pub code_challenge_method: Option<String>,
    /// Response type; only `code` is meaningful
    pub response_type: Option<String>,
    /// Requested scopes; the upstream scope set is fixed
    pub scope: Option<String>,
}

/// Query parameters of the upstream callback
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackRequest {
    /// Upstream authorization code
    pub code: Option<String>,
    /// Internal state minted at authorize time
    pub state: Option<String>,
    /// Upstream error code
    pub error: Option<String>,
    /// Upstream error description
    pub error_description: Option<String>,
}

/// OAuth 2.0 Token Request (form-encoded)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Grant type (`authorization_code` or `refresh_token`)
    #[serde(default)]
    pub grant_type: Option<String>,
    /// Authorization code (for `authorization_code` grant)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Redirect URI (must match the one used at authorize time)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Client ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// PKCE code verifier (RFC 7636, for `authorization_code` grant)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Opaque bearer token
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Expires in seconds
    pub expires_in: i64,
    /// Refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Authorization server metadata (RFC 8414)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier (the base URL)
    pub issuer: String,
    /// Browser-facing authorize endpoint
    pub authorization_endpoint: String,
    /// Token endpoint
    pub token_endpoint: String,
    /// Dynamic client registration endpoint
    pub registration_endpoint: String,
    /// Supported response types
    pub response_types_supported: Vec<String>,
    /// Supported grant types
    pub grant_types_supported: Vec<String>,
    /// Supported PKCE methods
    pub code_challenge_methods_supported: Vec<String>,
    /// Supported token endpoint authentication methods
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    /// Metadata for an issuer rooted at `base_url`
    #[must_use]
    pub fn for_issuer(base_url: &str) -> Self {
        Self {
            issuer: base_url.to_owned(),
            authorization_endpoint: format!("{base_url}{}", paths::AUTHORIZE),
            token_endpoint: format!("{base_url}{}", paths::TOKEN),
            registration_endpoint: format!("{base_url}{}", paths::REGISTER),
            response_types_supported: vec![oauth::RESPONSE_TYPE_CODE.to_owned()],
            grant_types_supported: vec![
                oauth::GRANT_AUTHORIZATION_CODE.to_owned(),
                oauth::GRANT_REFRESH_TOKEN.to_owned(),
            ],
            code_challenge_methods_supported: vec![oauth::PKCE_METHOD_S256.to_owned()],
            token_endpoint_auth_methods_supported: vec![oauth::AUTH_METHOD_NONE.to_owned()],
        }
    }
}

/// Protected resource metadata pointing back at this issuer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The protected MCP endpoint
    pub resource: String,
    /// Authorization servers that issue tokens for it
    pub authorization_servers: Vec<String>,
}

impl ProtectedResourceMetadata {
    /// Metadata for the MCP endpoint under `base_url`
    #[must_use]
    pub fn for_issuer(base_url: &str) -> Self {
        Self {
            resource: format!("{base_url}{}", paths::MCP),
            authorization_servers: vec![base_url.to_owned()],
        }
    }
}

/// OAuth 2.0 Error Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable error description
    pub error_description: Option<String>,
    /// URI for error information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuth2Error {
    fn with_code(error: &str, description: &str) -> Self {
        Self {
            error: error.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: None,
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self {
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
            ..Self::with_code("invalid_request", description)
        }
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client(description: &str) -> Self {
        Self {
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
            ..Self::with_code("invalid_client", description)
        }
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self {
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
            ..Self::with_code("invalid_grant", description)
        }
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self {
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
            ..Self::with_code("unsupported_grant_type", "Grant type not supported")
        }
    }

    /// Create an `invalid_client_metadata` error (RFC 7591 Section 3.2.2)
    #[must_use]
    pub fn invalid_client_metadata(description: &str) -> Self {
        Self::with_code("invalid_client_metadata", description)
    }

    /// Create an `invalid_redirect_uri` error (RFC 7591 Section 3.2.2)
    #[must_use]
    pub fn invalid_redirect_uri(description: &str) -> Self {
        Self::with_code("invalid_redirect_uri", description)
    }

    /// Registration cap reached
    #[must_use]
    pub fn too_many_requests(description: &str) -> Self {
        Self::with_code("too_many_requests", description)
    }

    /// The authenticated identity is not allowed in
    #[must_use]
    pub fn access_denied(description: &str) -> Self {
        Self::with_code("access_denied", description)
    }

    /// Upstream or internal failure
    #[must_use]
    pub fn server_error(description: &str) -> Self {
        Self::with_code("server_error", description)
    }

    /// HTTP status for this error code
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "too_many_requests" => StatusCode::TOO_MANY_REQUESTS,
            "access_denied" => StatusCode::FORBIDDEN,
            "server_error" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl Display for OAuth2Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.error_description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_method_parse() {
        assert_eq!(PkceMethod::parse("S256"), Some(PkceMethod::S256));
        assert_eq!(PkceMethod::parse("plain"), None);
        assert_eq!(PkceMethod::S256.to_string(), "S256");
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            OAuth2Error::too_many_requests("full").status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            OAuth2Error::access_denied("nope").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            OAuth2Error::invalid_grant("bad").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_metadata_endpoints() {
        let metadata = AuthorizationServerMetadata::for_issuer("http://localhost:8080");
        assert_eq!(
            metadata.token_endpoint,
            "http://localhost:8080/oauth/token"
        );
        assert_eq!(metadata.code_challenge_methods_supported, vec!["S256"]);

        let resource = ProtectedResourceMetadata::for_issuer("http://localhost:8080");
        assert_eq!(resource.resource, "http://localhost:8080/mcp");
    }
}
