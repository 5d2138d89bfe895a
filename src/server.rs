// ABOUTME: HTTP server assembly and lifecycle for the MCP OAuth bridge
// ABOUTME: Merges OAuth, MCP and health routes under tracing and CORS layers with graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Server
//!
//! [`build_router`] produces the full application; [`run`] binds it and
//! serves until SIGINT or SIGTERM.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, Response};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, Span};

use crate::config::ServerConfig;
use crate::mcp::ServerResources;
use crate::middleware::{create_request_span, preflight_no_content, setup_cors};
use crate::oauth2_server::OAuth2Routes;
use crate::routes::{HealthRoutes, McpRoutes};
use crate::upstream::UpstreamIdentityClient;

/// Assemble every route with the shared middleware stack
pub fn build_router(resources: &Arc<ServerResources>) -> Router {
    Router::new()
        .merge(OAuth2Routes::routes(Arc::clone(resources)))
        .merge(McpRoutes::routes(Arc::clone(resources)))
        .merge(HealthRoutes::routes(Arc::clone(resources)))
        .layer(setup_cors(&resources.config))
        .layer(middleware::from_fn(preflight_no_content))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| create_request_span(request))
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    tracing::debug!(elapsed_ms = latency.as_millis(), "request handled");
                }),
        )
}

/// Bind and serve until a shutdown signal arrives
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails
pub async fn run(config: ServerConfig, upstream: Arc<dyn UpstreamIdentityClient>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.http_port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.http_port))?;

    let resources = Arc::new(ServerResources::new(config, upstream));
    let app = build_router(&resources);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("MCP OAuth bridge listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(resources.shutdown.clone()))
        .await
        .context("HTTP server failed")?;

    resources.store.close();
    info!("MCP OAuth bridge stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM and closes every persistent channel
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = resolve_on_signal(tokio::signal::ctrl_c(), "Ctrl+C");

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

/// Resolve once the signal fires; a handler that cannot be installed never resolves
async fn resolve_on_signal<F>(signal: F, name: &str)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!("Failed to listen for {}: {}", name, e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_that_fires_resolves() {
        let waited = tokio::time::timeout(
            Duration::from_millis(100),
            resolve_on_signal(async { Ok(()) }, "test"),
        )
        .await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn test_failed_signal_registration_does_not_trigger_shutdown() {
        let waited = tokio::time::timeout(
            Duration::from_millis(100),
            resolve_on_signal(async { Err(io::Error::other("no handler")) }, "test"),
        )
        .await;
        assert!(waited.is_err());
    }
}
