// ABOUTME: Model Context Protocol (MCP) implementation for tool clients
// ABOUTME: Dispatch core, tool catalogue, readiness checks and the persistent push channel
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub mod protocol;
pub mod readiness;
pub mod resources;
pub mod schema;
pub mod sse_transport;
/// Tool execution
pub mod tool_handlers;
/// Typed tool calls
pub mod tools;

pub use protocol::{ProtocolHandler, UserContext};
pub use resources::ServerResources;
