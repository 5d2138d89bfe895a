// ABOUTME: Main library entry point for the MCP OAuth bridge
// ABOUTME: OAuth 2.0 authorization server over GitHub sign-in plus MCP JSON-RPC transports
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # MCP OAuth Bridge
//!
//! An OAuth 2.0 authorization server that lets Model Context Protocol (MCP)
//! tool clients sign in with GitHub, plus the MCP endpoint those clients call
//! with the bearer tokens it issues.
//!
//! ## Features
//!
//! - **Dynamic client registration**: public clients self-register (RFC 7591)
//! - **PKCE**: `S256` challenges bound to single-use authorization codes
//! - **Refresh rotation**: every refresh token is consumed on use
//! - **Three MCP framings**: unary JSON, single-event streaming and a
//!   persistent push channel with keepalives
//!
//! ## Architecture
//!
//! - **Store**: in-memory credential tables with TTLs and a background reaper
//! - **`OAuth2` server**: the authorization flow and its HTTP routes
//! - **Upstream**: the GitHub identity client behind a trait
//! - **MCP**: a transport-agnostic dispatch core and the tools it serves
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use mcp_oauth_bridge::config::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("MCP OAuth bridge configured with port: HTTP={}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Environment-driven configuration
pub mod config;

/// Application constants: TTLs, token sizes, paths and protocol identity
pub mod constants;

/// Unified error handling
pub mod errors;

/// JSON-RPC 2.0 envelope types
pub mod jsonrpc;

/// Structured logging setup and audit helpers
pub mod logging;

/// MCP dispatch core, tools and transports
pub mod mcp;

/// HTTP middleware: bearer authentication, CORS and request tracing
pub mod middleware;

/// OAuth 2.0 authorization server
pub mod oauth2_server;

/// Health and MCP HTTP routes
pub mod routes;

/// Router assembly and server lifecycle
pub mod server;

/// In-memory credential store
pub mod store;

/// Upstream identity provider client
pub mod upstream;
