// ABOUTME: Constants module grouping TTLs, token sizes, protocol identity, and upstream endpoints
// ABOUTME: Every lifetime and limit the authorization server enforces is declared here
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped into small domain modules rather than one flat list.

/// Lifetimes of records held by the credential store
pub mod ttl {
    use std::time::Duration;

    /// Authorization sessions expire if the upstream callback never arrives
    pub const AUTHORIZATION_SESSION: Duration = Duration::from_secs(10 * 60);

    /// Authorization codes must be exchanged within this window
    pub const AUTHORIZATION_CODE: Duration = Duration::from_secs(10 * 60);

    /// Refresh tokens live for 30 days
    pub const REFRESH_TOKEN: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    /// Dynamically registered clients live for 30 days
    pub const CLIENT_REGISTRATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    /// Access token validity in seconds, reported as `expires_in`
    pub const ACCESS_TOKEN_SECS: i64 = 3600;

    /// Upstream tokens without an `expires_in` are assumed to live 8 hours
    pub const UPSTREAM_TOKEN_DEFAULT_SECS: i64 = 8 * 60 * 60;

    /// Interval between background sweeps of the credential store
    pub const REAPER_INTERVAL: Duration = Duration::from_secs(5 * 60);
}

/// Sizes (in random bytes) of the opaque values the server mints
pub mod token_sizes {
    /// Internal state forwarded to the upstream provider
    pub const STATE_BYTES: usize = 32;
    /// Authorization code handed to the tool client
    pub const AUTHORIZATION_CODE_BYTES: usize = 32;
    /// Access tokens
    pub const ACCESS_TOKEN_BYTES: usize = 64;
    /// Refresh tokens
    pub const REFRESH_TOKEN_BYTES: usize = 64;
    /// Dynamically registered client identifiers
    pub const CLIENT_ID_BYTES: usize = 16;
}

/// Throttling limits
pub mod limits {
    /// Live client registrations allowed before `/register` answers 429
    pub const MAX_CLIENT_REGISTRATIONS: usize = 1000;

    /// Inbound messages buffered between the persistent channel reader and its dispatch loop
    pub const CHANNEL_QUEUE_CAPACITY: usize = 32;

    /// Page size used when listing team repositories upstream
    pub const UPSTREAM_PAGE_SIZE: usize = 100;

    /// Maximum repositories returned by a name-prefix search
    pub const MAX_SEARCH_RESULTS: usize = 200;
}

/// OAuth 2.0 protocol values
pub mod oauth {
    /// `grant_type` for the authorization code flow
    pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
    /// `grant_type` for refresh token rotation
    pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
    /// The only supported `response_type`
    pub const RESPONSE_TYPE_CODE: &str = "code";
    /// The only supported token endpoint authentication method (public clients)
    pub const AUTH_METHOD_NONE: &str = "none";
    /// The only supported PKCE challenge method
    pub const PKCE_METHOD_S256: &str = "S256";
    /// Token type returned by the token endpoint
    pub const TOKEN_TYPE_BEARER: &str = "Bearer";

    /// Upstream scopes requested during authorization
    pub const UPSTREAM_SCOPES: &str = "read:user read:org user:email";

    /// Upstream authorize endpoint
    pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
    /// Upstream token endpoint
    pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
    /// Upstream REST API base
    pub const GITHUB_API_BASE: &str = "https://api.github.com";
    /// REST API version header value
    pub const GITHUB_API_VERSION: &str = "2022-11-28";
}

/// HTTP paths served by the authorization server
pub mod paths {
    /// Dynamic client registration
    pub const REGISTER: &str = "/register";
    /// Browser-facing authorize endpoint
    pub const AUTHORIZE: &str = "/oauth/authorize";
    /// Upstream redirect target
    pub const CALLBACK: &str = "/oauth/callback";
    /// Token endpoint
    pub const TOKEN: &str = "/oauth/token";
    /// MCP endpoint
    pub const MCP: &str = "/mcp";
    /// Authorization server metadata
    pub const AUTHORIZATION_SERVER_METADATA: &str = "/.well-known/oauth-authorization-server";
    /// Protected resource metadata
    pub const PROTECTED_RESOURCE_METADATA: &str = "/.well-known/oauth-protected-resource";
}

/// MCP protocol identity
pub mod protocol {
    use std::time::Duration;

    /// MCP protocol revision answered by `initialize`
    pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

    /// JSON-RPC version (standard, not configurable)
    pub const JSONRPC_VERSION: &str = "2.0";

    /// Server name reported in `serverInfo`
    pub const SERVER_NAME: &str = "mcp-onboarding";

    /// Server version reported in `serverInfo`
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Keepalive cadence on the persistent push channel
    pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

    /// Payload of a keepalive event
    pub const KEEPALIVE_PAYLOAD: &str = r#"{"type":"keepalive"}"#;

    /// Event name carrying JSON-RPC replies on the persistent channel
    pub const MESSAGE_EVENT: &str = "message";
}

/// Service names used for structured logging
pub mod service_names {
    /// Name of this service
    pub const MCP_OAUTH_BRIDGE: &str = "mcp-oauth-bridge";
}
