// ABOUTME: MCP (Model Context Protocol) route handlers for tool clients
// ABOUTME: Unary JSON, single-event streaming and persistent push adapters over one dispatch core
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! MCP protocol routes
//!
//! One path, three framings:
//!
//! - `GET` opens the persistent push channel
//! - `POST` with an `Accept` header naming `text/event-stream` answers with a
//!   single `data:` event
//! - any other `POST` answers with a JSON body
//!
//! Every method sits behind bearer authentication.

use std::io;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware,
    response::{sse::Sse, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use futures_util::TryStreamExt;

use crate::constants::paths;
use crate::errors::AppError;
use crate::jsonrpc::JsonRpcResponse;
use crate::mcp::sse_transport::open_channel;
use crate::mcp::{ServerResources, UserContext};
use crate::middleware::require_bearer;

const EVENT_STREAM: &str = "text/event-stream";

/// MCP routes implementation
pub struct McpRoutes;

impl McpRoutes {
    /// Create the MCP endpoint
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                paths::MCP,
                get(Self::handle_channel)
                    .post(Self::handle_post)
                    .fallback(Self::handle_unsupported_method),
            )
            .route_layer(middleware::from_fn_with_state(
                Arc::clone(&resources),
                require_bearer,
            ))
            .with_state(resources)
    }

    /// Open the persistent push channel (GET /mcp)
    async fn handle_channel(
        State(resources): State<Arc<ServerResources>>,
        user: Option<Extension<UserContext>>,
        request: Request,
    ) -> Response {
        let user = user.map(|Extension(user)| user).unwrap_or_default();
        let inbound = request
            .into_body()
            .into_data_stream()
            .map_err(io::Error::other);

        let (stream, _lifecycle) = open_channel(
            inbound,
            Arc::clone(&resources.protocol),
            user,
            resources.config.keepalive_interval,
            &resources.shutdown,
        );

        let mut response = Sse::new(stream).into_response();
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        response
    }

    /// Unary or single-event request (POST /mcp)
    async fn handle_post(
        State(resources): State<Arc<ServerResources>>,
        user: Option<Extension<UserContext>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let user = user.map(|Extension(user)| user).unwrap_or_default();
        let reply = resources.protocol.handle_message(&body, &user).await;

        if wants_event_stream(&headers) {
            single_event(reply)
        } else {
            unary(reply)
        }
    }

    async fn handle_unsupported_method(method: Method) -> AppError {
        AppError::method_not_allowed(method.as_str())
    }
}

/// Whether the caller's `Accept` header asks for an event stream
fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains(EVENT_STREAM))
}

fn unary(reply: Option<JsonRpcResponse>) -> Response {
    match reply {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

fn single_event(reply: Option<JsonRpcResponse>) -> Response {
    let Some(reply) = reply else {
        return StatusCode::ACCEPTED.into_response();
    };

    match serde_json::to_string(&reply) {
        Ok(data) => (
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM)),
                (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            ],
            Body::from(format!("data: {data}\n\n")),
        )
            .into_response(),
        Err(e) => AppError::internal(format!("Failed to serialize MCP reply: {e}")).into_response(),
    }
}
