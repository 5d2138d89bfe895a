// ABOUTME: HTTP middleware for request tracing, bearer authentication, and CORS
// ABOUTME: Provides request ID spans, the MCP bearer gate, and cross-origin configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Bearer authentication for the MCP endpoint
pub mod auth;
/// Cross-origin configuration
pub mod cors;
/// Request spans and request ids
pub mod tracing;

// Authentication middleware
pub use auth::{require_bearer, McpAuthMiddleware};

// CORS configuration
pub use cors::{preflight_no_content, setup_cors};

// Request tracing
pub use tracing::{create_mcp_span, create_request_span};
