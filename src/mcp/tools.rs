// ABOUTME: Typed tool invocations resolved from loosely typed tools/call arguments
// ABOUTME: Validates required string parameters before any tool runs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde_json::{Map, Value};
use thiserror::Error;

use crate::jsonrpc::error_codes;

/// Output format for `get_time`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFormat {
    /// RFC 3339
    #[default]
    Iso,
    /// Seconds since the epoch
    Unix,
    /// Readable UTC timestamp
    Human,
}

impl TimeFormat {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("unix") => Self::Unix,
            Some("human") => Self::Human,
            _ => Self::Iso,
        }
    }
}

/// How `team_readiness` selects repositories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamSelector {
    /// GitHub team slug
    Team(String),
    /// Repository name prefix
    Prefix(String),
}

impl TeamSelector {
    /// Label used in the summary heading
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Team(slug) => slug.clone(),
            Self::Prefix(prefix) => format!("{prefix}*"),
        }
    }
}

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    /// `hello_world`
    HelloWorld,
    /// `greet`; `name` defaults to the caller's login
    Greet {
        /// Person to greet
        name: Option<String>,
    },
    /// `whoami`
    WhoAmI,
    /// `echo`
    Echo {
        /// Text to echo back
        message: String,
    },
    /// `get_time`
    GetTime {
        /// Output format
        format: TimeFormat,
    },
    /// `check_agent_readiness`
    CheckAgentReadiness {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
    },
    /// `team_readiness`
    TeamReadiness {
        /// Organization to scan
        org: String,
        /// Team or name prefix
        selector: TeamSelector,
    },
}

/// Tool failures, each mapped onto a reserved JSON-RPC code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Unknown tool or bad arguments (-32602)
    #[error("{0}")]
    InvalidParams(String),
    /// Upstream or formatting failure (-32603)
    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    /// JSON-RPC error code for this failure
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::InvalidParams(_) => error_codes::INVALID_PARAMS,
            Self::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }
}

impl ToolCall {
    /// Resolve a tool name and its arguments
    ///
    /// # Errors
    /// Returns [`ToolError::InvalidParams`] for unknown tools and missing required arguments
    pub fn parse(name: &str, arguments: &Map<String, Value>) -> Result<Self, ToolError> {
        match name {
            "hello_world" => Ok(Self::HelloWorld),
            "greet" => Ok(Self::Greet {
                name: non_empty(arguments, "name"),
            }),
            "whoami" => Ok(Self::WhoAmI),
            "echo" => non_empty(arguments, "message")
                .map(|message| Self::Echo { message })
                .ok_or_else(|| ToolError::InvalidParams("message is required".into())),
            "get_time" => Ok(Self::GetTime {
                format: TimeFormat::parse(arguments.get("format").and_then(Value::as_str)),
            }),
            "check_agent_readiness" => {
                match (non_empty(arguments, "owner"), non_empty(arguments, "repo")) {
                    (Some(owner), Some(repo)) => Ok(Self::CheckAgentReadiness { owner, repo }),
                    _ => Err(ToolError::InvalidParams("owner and repo are required".into())),
                }
            }
            "team_readiness" => {
                let org = non_empty(arguments, "org")
                    .ok_or_else(|| ToolError::InvalidParams("org is required".into()))?;
                let selector = non_empty(arguments, "team")
                    .map(TeamSelector::Team)
                    .or_else(|| non_empty(arguments, "prefix").map(TeamSelector::Prefix))
                    .ok_or_else(|| {
                        ToolError::InvalidParams("either team or prefix is required".into())
                    })?;
                Ok(Self::TeamReadiness { org, selector })
            }
            other => Err(ToolError::InvalidParams(format!("Unknown tool: {other}"))),
        }
    }

    /// Tool name as advertised by `tools/list`
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::HelloWorld => "hello_world",
            Self::Greet { .. } => "greet",
            Self::WhoAmI => "whoami",
            Self::Echo { .. } => "echo",
            Self::GetTime { .. } => "get_time",
            Self::CheckAgentReadiness { .. } => "check_agent_readiness",
            Self::TeamReadiness { .. } => "team_readiness",
        }
    }
}

/// A string argument that is present, a string, and not blank
fn non_empty(arguments: &Map<String, Value>, key: &str) -> Option<String> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
