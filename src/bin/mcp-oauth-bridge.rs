// ABOUTME: Server binary for the MCP OAuth bridge
// ABOUTME: Loads environment configuration, applies CLI overrides and serves until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # MCP OAuth Bridge Binary
//!
//! Starts the OAuth 2.0 authorization server and the MCP endpoint on one port.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mcp_oauth_bridge::{
    config::ServerConfig, logging, server, upstream::github::GitHubClient,
};
use tracing::{error, info};

/// Command-line overrides for the environment configuration
#[derive(Parser)]
#[command(name = "mcp-oauth-bridge")]
#[command(about = "OAuth 2.0 authorization server bridging GitHub sign-in to MCP tool clients")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override the public base URL
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
        config.validate()?;
    }

    info!("Starting MCP OAuth bridge");
    info!("{}", config.summary());

    let upstream = Arc::new(GitHubClient::new(config.upstream.clone()));

    if let Err(e) = server::run(config, upstream).await {
        error!("Server error: {:#}", e);
        return Err(e);
    }

    Ok(())
}
