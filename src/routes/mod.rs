// ABOUTME: Route module organization for the MCP OAuth bridge HTTP endpoints
// ABOUTME: Groups health and MCP transport routes; OAuth routes live beside the authorization server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module
//!
//! Each domain module contains only route definitions and thin handler
//! functions that delegate to the protocol core or the credential store.

/// Health check and system status routes
pub mod health;
/// Model Context Protocol (MCP) transport routes
pub mod mcp;

/// Health route handlers
pub use health::HealthRoutes;
/// MCP route handlers
pub use mcp::McpRoutes;
