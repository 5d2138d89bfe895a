// ABOUTME: CORS middleware configuration for the OAuth and MCP endpoints
// ABOUTME: Provides Cross-Origin Resource Sharing setup for browser-based tool clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::{header, HeaderValue, Method, StatusCode};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::ServerConfig;

/// Configure CORS settings for the server
///
/// `CORS_ALLOWED_ORIGINS` of `*` (or empty) admits any origin; otherwise it is a
/// comma-separated origin list. Unparseable entries are skipped, and a list with
/// no usable entries falls back to any origin.
pub fn setup_cors(config: &ServerConfig) -> CorsLayer {
    let configured = config.cors_allowed_origins.trim();
    let allow_origin = if configured.is_empty() || configured == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = configured
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();

        if origins.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(origins)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .expose_headers([header::WWW_AUTHENTICATE])
}

/// Answer preflight requests with 204 instead of the CORS layer's 200
///
/// Must wrap the CORS layer.
pub async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
