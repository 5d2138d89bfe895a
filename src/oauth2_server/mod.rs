// ABOUTME: OAuth 2.0 authorization server bridging upstream GitHub sign-in to opaque bearer tokens
// ABOUTME: Provides RFC 7591 client registration, PKCE authorization and refresh rotation for MCP clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # OAuth 2.0 Authorization Server
//!
//! The tool client only ever sees this server's codes and tokens. The upstream
//! GitHub grant is held server-side and bound to the issued credentials.
//!
//! - [`client_registration`]: `POST /register`
//! - [`endpoints`]: authorize, upstream callback and token grants
//! - [`routes`]: the axum surface, including discovery metadata

/// Dynamic client registration
pub mod client_registration;
/// Authorization state machine
pub mod endpoints;
/// Wire types and error bodies
pub mod models;
pub mod routes;

pub use client_registration::ClientRegistrationManager;
pub use endpoints::OAuth2AuthorizationServer;
pub use models::{
    AuthorizeRequest, CallbackRequest, ClientRegistrationRequest, ClientRegistrationResponse,
    OAuth2Error, PkceMethod, TokenRequest, TokenResponse,
};
pub use routes::OAuth2Routes;
