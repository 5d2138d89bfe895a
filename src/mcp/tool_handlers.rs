// ABOUTME: Tool execution handlers for MCP tools/call requests
// ABOUTME: Runs validated tool calls for the authenticated user and renders text results
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use super::protocol::UserContext;
use super::readiness::{self, TeamSummary};
use super::schema::{CallToolParams, ToolResponse};
use super::tools::{TeamSelector, TimeFormat, ToolCall, ToolError};
use crate::logging::AppLogger;
use crate::upstream::UpstreamIdentityClient;

/// Tool execution handlers for MCP protocol
pub struct ToolHandlers {
    upstream: Arc<dyn UpstreamIdentityClient>,
}

impl ToolHandlers {
    /// Create handlers that reach repositories through `upstream`
    #[must_use]
    pub fn new(upstream: Arc<dyn UpstreamIdentityClient>) -> Self {
        Self { upstream }
    }

    /// Handle a `tools/call` request
    ///
    /// # Errors
    /// Returns [`ToolError::InvalidParams`] for malformed params, unknown tools and
    /// missing arguments, and [`ToolError::Internal`] when the upstream provider fails
    pub async fn handle_tools_call(
        &self,
        params: Option<Value>,
        user: &UserContext,
    ) -> Result<ToolResponse, ToolError> {
        let params: CallToolParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .ok_or_else(|| ToolError::InvalidParams("Invalid params".into()))?;

        tracing::Span::current().record("tool_name", params.name.as_str());
        info!(tool = %params.name, user = %user.login, "tool called");

        let call = ToolCall::parse(&params.name, &params.arguments)?;
        let start = Instant::now();
        let result = self.execute(&call, user).await;

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        AppLogger::log_mcp_tool_call(&user.login, call.name(), result.is_ok(), duration_ms);
        result
    }

    async fn execute(&self, call: &ToolCall, user: &UserContext) -> Result<ToolResponse, ToolError> {
        match call {
            ToolCall::HelloWorld => Ok(ToolResponse::text(format!(
                "Hello, World! 👋 Greetings from the MCP onboarding server. You are authenticated as @{}.",
                user.login
            ))),
            ToolCall::Greet { name } => Ok(ToolResponse::text(format!(
                "Hello, {}! 🎉 Welcome to the MCP onboarding server.",
                name.as_deref().unwrap_or(&user.login)
            ))),
            ToolCall::WhoAmI => Ok(ToolResponse::text(format!(
                "GitHub User Information:\n- Username: @{}\n- User ID: {}\n- Authenticated: ✅\n\nThis information is from your GitHub OAuth session.",
                user.login, user.id
            ))),
            ToolCall::Echo { message } => Ok(ToolResponse::text(format!("Echo: {message}"))),
            ToolCall::GetTime { format } => Ok(ToolResponse::text(format!(
                "Current server time: {}",
                current_time(*format)
            ))),
            ToolCall::CheckAgentReadiness { owner, repo } => {
                self.check_agent_readiness(user, owner, repo).await
            }
            ToolCall::TeamReadiness { org, selector } => {
                self.team_readiness(user, org, selector).await
            }
        }
    }

    async fn check_agent_readiness(
        &self,
        user: &UserContext,
        owner: &str,
        repo: &str,
    ) -> Result<ToolResponse, ToolError> {
        let report = readiness::assess_repository(
            self.upstream.as_ref(),
            &user.upstream_access_token,
            owner,
            repo,
        )
        .await
        .map_err(|e| {
            tracing::warn!("Readiness check for {}/{} failed: {}", owner, repo, e);
            ToolError::Internal(format!("Failed to inspect repo {owner}/{repo}"))
        })?;

        debug!(owner, repo, level = %report.level, "readiness assessed");
        Ok(ToolResponse::text(report.to_markdown()))
    }

    async fn team_readiness(
        &self,
        user: &UserContext,
        org: &str,
        selector: &TeamSelector,
    ) -> Result<ToolResponse, ToolError> {
        let token = user.upstream_access_token.as_str();
        let repos = match selector {
            TeamSelector::Team(slug) => self.upstream.list_team_repos(token, org, slug).await,
            TeamSelector::Prefix(prefix) => {
                self.upstream.search_repos_by_prefix(token, org, prefix).await
            }
        }
        .map_err(|e| {
            tracing::warn!("Listing repositories for {}/{} failed: {}", org, selector.label(), e);
            ToolError::Internal("Failed to list repos".into())
        })?;

        let mut summary = TeamSummary {
            org: org.to_owned(),
            team: selector.label(),
            repos: Vec::with_capacity(repos.len()),
        };
        for repo in repos.iter().filter(|r| r.is_active_source()) {
            summary.repos.push(
                readiness::assess_repository_light(self.upstream.as_ref(), token, org, &repo.name)
                    .await,
            );
        }

        Ok(ToolResponse::text(summary.to_markdown()))
    }
}

fn current_time(format: TimeFormat) -> String {
    let now = Utc::now();
    match format {
        TimeFormat::Unix => now.timestamp().to_string(),
        TimeFormat::Human => now.format("%A, %B %-d, %Y at %-I:%M %p UTC").to_string(),
        TimeFormat::Iso => now.to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_time_is_numeric() {
        assert!(current_time(TimeFormat::Unix).parse::<i64>().is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&current_time(TimeFormat::Iso)).is_ok());
        assert!(current_time(TimeFormat::Human).ends_with("UTC"));
    }
}
