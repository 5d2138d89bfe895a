// ABOUTME: Request tracing middleware for correlation and structured logging
// ABOUTME: Reuses or generates request IDs and creates a span for every HTTP request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::http::Request;
use tracing::Span;
use uuid::Uuid;

/// Header carrying the caller's correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id from `x-request-id`, or a fresh `req_<uuid>` when absent or unreadable
#[must_use]
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map_or_else(
            || format!("req_{}", Uuid::new_v4().simple()),
            ToOwned::to_owned,
        )
}

/// Span factory for `TraceLayer::make_span_with`
pub fn create_request_span<B>(request: &Request<B>) -> Span {
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id(request),
        user = tracing::field::Empty,
        status_code = tracing::field::Empty,
    )
}

/// Create a tracing span for MCP operations
pub fn create_mcp_span(method: &str, user: &str) -> Span {
    tracing::info_span!(
        "mcp_operation",
        method = %method,
        user = %user,
        tool_name = tracing::field::Empty,
    )
}
