// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses base URL, upstream OAuth credentials, org policy and timing knobs from env vars
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management for production deployment

use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::constants::{paths, protocol, ttl};

/// Default public base URL when `BASE_URL` is unset
const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development (default)
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a development environment
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Credentials this server uses with the upstream identity provider
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct UpstreamOAuthConfig {
    /// Upstream OAuth app client id
    pub client_id: String,
    /// Upstream OAuth app client secret
    pub client_secret: String,
}

impl UpstreamOAuthConfig {
    /// Both halves of the credential are present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl fmt::Debug for UpstreamOAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamOAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Server configuration loaded at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Deployment environment
    pub environment: Environment,
    /// `RUST_LOG` filter directive, as given
    pub log_filter: String,
    /// Interface to bind
    pub host: String,
    /// HTTP listen port
    pub http_port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    /// Upstream OAuth credentials
    pub upstream: UpstreamOAuthConfig,
    /// Organization whose members may sign in; `None` admits any authenticated identity
    pub allowed_organization: Option<String>,
    /// Keepalive cadence on the persistent MCP channel
    pub keepalive_interval: Duration,
    /// Interval between credential store sweeps
    pub reaper_interval: Duration,
    /// Comma-separated CORS origins, or `*`
    pub cors_allowed_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            log_filter: "info".to_owned(),
            host: "0.0.0.0".to_owned(),
            http_port: 8080,
            base_url: DEFAULT_BASE_URL.to_owned(),
            upstream: UpstreamOAuthConfig::default(),
            allowed_organization: None,
            keepalive_interval: protocol::KEEPALIVE_INTERVAL,
            reaper_interval: ttl::REAPER_INTERVAL,
            cors_allowed_origins: "*".to_owned(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed or validation fails
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let port_value = env::var("HTTP_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "8080".to_owned());

        let config = Self {
            environment: Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development")),
            log_filter: env_var_or("RUST_LOG", "info"),
            host: env_var_or("HOST", "0.0.0.0"),
            http_port: port_value
                .parse()
                .with_context(|| format!("Invalid HTTP_PORT value: {port_value}"))?,
            base_url: normalize_base_url(&env_var_or("BASE_URL", DEFAULT_BASE_URL)),
            upstream: UpstreamOAuthConfig {
                client_id: env_var_or("GITHUB_CLIENT_ID", ""),
                client_secret: env_var_or("GITHUB_CLIENT_SECRET", ""),
            },
            allowed_organization: env::var("ALLOWED_ORGANIZATION")
                .ok()
                .map(|org| org.trim().to_owned())
                .filter(|org| !org.is_empty()),
            keepalive_interval: Duration::from_secs(
                env_var_or(
                    "MCP_KEEPALIVE_SECS",
                    &protocol::KEEPALIVE_INTERVAL.as_secs().to_string(),
                )
                .parse()
                .context("Invalid MCP_KEEPALIVE_SECS value")?,
            ),
            reaper_interval: Duration::from_secs(
                env_var_or(
                    "STORE_REAPER_INTERVAL_SECS",
                    &ttl::REAPER_INTERVAL.as_secs().to_string(),
                )
                .parse()
                .context("Invalid STORE_REAPER_INTERVAL_SECS value")?,
            ),
            cors_allowed_origins: env_var_or("CORS_ALLOWED_ORIGINS", "*"),
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not http(s), the port or an interval is zero,
    /// or upstream credentials are missing in production
    pub fn validate(&self) -> Result<()> {
        let parsed = Url::parse(&self.base_url)
            .with_context(|| format!("BASE_URL is not a valid URL: {}", self.base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("BASE_URL must use http or https: {}", self.base_url));
        }

        if self.http_port == 0 {
            return Err(anyhow!("HTTP_PORT must be non-zero"));
        }

        if self.keepalive_interval.is_zero() || self.reaper_interval.is_zero() {
            return Err(anyhow!(
                "MCP_KEEPALIVE_SECS and STORE_REAPER_INTERVAL_SECS must be non-zero"
            ));
        }

        if !self.upstream.is_configured() {
            if self.environment.is_production() {
                return Err(anyhow!(
                    "GITHUB_CLIENT_ID and GITHUB_CLIENT_SECRET are required in production"
                ));
            }
            warn!("GITHUB_CLIENT_ID or GITHUB_CLIENT_SECRET missing; upstream sign-in will fail");
        }

        Ok(())
    }

    /// Callback URI registered with the upstream provider
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.base_url, paths::CALLBACK)
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "MCP OAuth Bridge Configuration:\n\
             - Environment: {}\n\
             - Listen: {}:{}\n\
             - Base URL: {}\n\
             - Log Filter: {}\n\
             - Upstream OAuth: {}\n\
             - Allowed Organization: {}\n\
             - Keepalive: {}s\n\
             - Store Sweep: {}s\n\
             - CORS Origins: {}\n\
             - Protocol Version: {}",
            self.environment,
            self.host,
            self.http_port,
            self.base_url,
            self.log_filter,
            if self.upstream.is_configured() {
                "Configured"
            } else {
                "Missing"
            },
            self.allowed_organization.as_deref().unwrap_or("(any)"),
            self.keepalive_interval.as_secs(),
            self.reaper_interval.as_secs(),
            self.cors_allowed_origins,
            protocol::MCP_PROTOCOL_VERSION,
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Strip trailing slashes so paths can be appended verbatim
fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}
