// ABOUTME: Centralized resource container shared by every HTTP handler
// ABOUTME: Owns the configuration, credential store, upstream client, OAuth server and MCP dispatcher
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Server Resources Module
//!
//! Built once at startup and handed to each router as `Arc<ServerResources>`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::protocol::ProtocolHandler;
use crate::config::ServerConfig;
use crate::middleware::McpAuthMiddleware;
use crate::oauth2_server::OAuth2AuthorizationServer;
use crate::store::CredentialStore;
use crate::upstream::UpstreamIdentityClient;

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
    /// Credential store shared by the OAuth flow and bearer checks
    pub store: Arc<CredentialStore>,
    /// Upstream identity provider client
    pub upstream: Arc<dyn UpstreamIdentityClient>,
    /// Authorization server
    pub oauth2_server: Arc<OAuth2AuthorizationServer>,
    /// JSON-RPC dispatch core
    pub protocol: Arc<ProtocolHandler>,
    /// Bearer authentication for `/mcp`
    pub auth_middleware: Arc<McpAuthMiddleware>,
    /// Fires on server shutdown; parent of every persistent channel token
    pub shutdown: CancellationToken,
}

impl ServerResources {
    /// Wire the shared components together
    ///
    /// Starts the credential store reaper, so this must run inside a Tokio runtime.
    #[must_use]
    pub fn new(config: ServerConfig, upstream: Arc<dyn UpstreamIdentityClient>) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(CredentialStore::new(config.reaper_interval));
        let oauth2_server = Arc::new(OAuth2AuthorizationServer::new(
            &config,
            Arc::clone(&store),
            Arc::clone(&upstream),
        ));
        let protocol = Arc::new(ProtocolHandler::new(Arc::clone(&upstream)));
        let auth_middleware = Arc::new(McpAuthMiddleware::new(
            Arc::clone(&store),
            &config.base_url,
        ));

        Self {
            config,
            store,
            upstream,
            oauth2_server,
            protocol,
            auth_middleware,
            shutdown: CancellationToken::new(),
        }
    }
}
