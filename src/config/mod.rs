// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Exposes the environment-driven ServerConfig consumed at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module
//!
//! The server is configured exclusively through environment variables, with a
//! handful of CLI overrides applied by the binary.

/// Environment and server configuration
pub mod environment;

/// Re-export main configuration types from environment
pub use environment::{Environment, ServerConfig, UpstreamOAuthConfig};
