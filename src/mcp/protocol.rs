// ABOUTME: MCP protocol dispatch core shared by the unary, semi-streaming and channel transports
// ABOUTME: Parses JSON-RPC envelopes and routes initialize, ping, tools/list and tools/call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # MCP Protocol Handlers
//!
//! Every transport hands raw bytes or a decoded [`JsonRpcRequest`] to
//! [`ProtocolHandler`] and forwards whatever reply comes back. `None` means
//! the message was a notification and nothing is sent.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn, Instrument};

use super::schema::{get_tools, InitializeResponse, ListToolsResponse};
use super::tool_handlers::ToolHandlers;
use crate::constants::protocol::JSONRPC_VERSION;
use crate::jsonrpc::{error_codes, JsonRpcRequest, JsonRpcResponse};
use crate::middleware::create_mcp_span;
use crate::store::AccessTokenRecord;
use crate::upstream::UpstreamIdentityClient;

/// Identity attached to a request by bearer authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    /// Upstream login
    pub login: String,
    /// Upstream numeric id
    pub id: i64,
    /// Upstream credential used by repository tools
    pub upstream_access_token: String,
}

impl UserContext {
    /// Identity used when no authenticated user is attached
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            login: "anonymous".to_owned(),
            id: 0,
            upstream_access_token: String::new(),
        }
    }

    /// Identity behind an issued access token
    #[must_use]
    pub fn from_access_token(record: &AccessTokenRecord) -> Self {
        Self {
            login: record.user.login.clone(),
            id: record.user.id,
            upstream_access_token: record.upstream.access_token.clone(),
        }
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// MCP protocol handlers
pub struct ProtocolHandler {
    tools: ToolHandlers,
}

impl ProtocolHandler {
    /// Create a dispatcher whose tools reach repositories through `upstream`
    #[must_use]
    pub fn new(upstream: Arc<dyn UpstreamIdentityClient>) -> Self {
        Self {
            tools: ToolHandlers::new(upstream),
        }
    }

    /// Decode one JSON-RPC envelope
    ///
    /// # Errors
    /// Returns the `-32700` reply (with a null id) to send when the bytes are not
    /// a JSON-RPC request
    pub fn parse_envelope(bytes: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
        serde_json::from_slice(bytes).map_err(|e| {
            debug!("Rejected JSON-RPC envelope: {}", e);
            JsonRpcResponse::error(Some(Value::Null), error_codes::PARSE_ERROR, "Parse error")
        })
    }

    /// Parse and dispatch one message
    pub async fn handle_message(&self, bytes: &[u8], user: &UserContext) -> Option<JsonRpcResponse> {
        match Self::parse_envelope(bytes) {
            Ok(request) => self.dispatch(request, user).await,
            Err(parse_error) => Some(parse_error),
        }
    }

    /// Dispatch a decoded request; `None` for notifications
    pub async fn dispatch(&self, request: JsonRpcRequest, user: &UserContext) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            warn!("Invalid JSON-RPC version: got '{}'", request.jsonrpc);
            return request.id.map(|id| {
                JsonRpcResponse::error(Some(id), error_codes::INVALID_REQUEST, "Invalid Request")
            });
        }

        if request.is_notification()
            || matches!(request.method.as_str(), "initialized" | "notifications/initialized")
        {
            debug!(method = %request.method, "notification received");
            return None;
        }

        let id = request.id.clone();
        let response = match request.method.as_str() {
            "initialize" => to_result(id, &InitializeResponse::current()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => to_result(id, &ListToolsResponse { tools: get_tools() }),
            "tools/call" => match self
                .tools
                .handle_tools_call(request.params, user)
                .instrument(create_mcp_span(&request.method, &user.login))
                .await
            {
                Ok(result) => to_result(id, &result),
                Err(e) => JsonRpcResponse::error(id, e.code(), e.to_string()),
            },
            method => {
                debug!(method, "unknown JSON-RPC method");
                JsonRpcResponse::error(id, error_codes::METHOD_NOT_FOUND, "Method not found")
            }
        };
        Some(response)
    }
}

fn to_result<T: Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => {
            tracing::error!("Failed to serialize JSON-RPC result: {}", e);
            JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, "Internal error")
        }
    }
}
