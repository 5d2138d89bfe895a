// ABOUTME: MCP protocol schema definitions and message structures
// ABOUTME: Defines initialize results, tool schemas and tool call results for this server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! MCP Protocol Schema Definitions
//!
//! Type-safe definitions for the initialize handshake, the advertised tool
//! catalogue and tool call results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::protocol::{MCP_PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};

/// Server Information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name
    pub name: String,
    /// Crate version
    pub version: String,
}

/// MCP Tool Schema Definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Name used in `tools/call`
    pub name: String,
    /// Human-readable description shown to the model
    pub description: String,
    /// Arguments accepted by the tool
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonSchema,
}

/// JSON Schema Definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchema {
    /// Always `object`
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Argument schemas by name
    pub properties: BTreeMap<String, PropertySchema>,
    /// Arguments that must be present
    pub required: Vec<String>,
}

/// JSON Schema Property Definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    /// JSON type name
    #[serde(rename = "type")]
    pub property_type: String,
    /// Argument description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Allowed values, for enumerated arguments
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// `tools/call` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool to invoke
    pub name: String,
    /// Raw arguments, decoded into a [`super::tools::ToolCall`]
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Tool Response after execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Result content blocks
    pub content: Vec<Content>,
    /// Set when the tool ran but reports failure
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResponse {
    /// Successful single-text result
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }
}

/// Content types for MCP messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    /// Plain or markdown text
    #[serde(rename = "text")]
    Text {
        /// Text body
        text: String,
    },
}

/// MCP Server Capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

/// Tools capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// Whether the tool list can change during a session
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Complete MCP Initialize Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    /// Negotiated MCP protocol version
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// What this server supports
    pub capabilities: ServerCapabilities,
    /// Name and version
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

impl InitializeResponse {
    /// Handshake result for this server
    #[must_use]
    pub fn current() -> Self {
        Self {
            protocol_version: MCP_PROTOCOL_VERSION.to_owned(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_owned(),
                version: SERVER_VERSION.to_owned(),
            },
        }
    }
}

/// `tools/list` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResponse {
    /// Every advertised tool
    pub tools: Vec<ToolSchema>,
}

/// Get all available tools
#[must_use]
pub fn get_tools() -> Vec<ToolSchema> {
    vec![
        tool("hello_world", "Returns a friendly hello world greeting with the authenticated user's GitHub username", &[], &[]),
        tool(
            "greet",
            "Returns a personalized greeting message",
            &[("name", string_property("The name to greet"))],
            &["name"],
        ),
        tool("whoami", "Returns information about the authenticated GitHub user", &[], &[]),
        tool(
            "echo",
            "Echoes back the provided message",
            &[("message", string_property("The message to echo back"))],
            &["message"],
        ),
        tool(
            "get_time",
            "Returns the current server time in various formats",
            &[(
                "format",
                PropertySchema {
                    property_type: "string".into(),
                    description: Some("Time format: 'iso', 'unix', or 'human'".into()),
                    enum_values: Some(vec!["iso".into(), "unix".into(), "human".into()]),
                },
            )],
            &[],
        ),
        tool(
            "check_agent_readiness",
            "Assess how ready a GitHub repository is for agent mode. Checks copilot-instructions.md, scoped instructions, custom agents, prompts, skills, setup steps, hooks and AGENTS.md, and returns a readiness scorecard with prioritized recommendations.",
            &[
                ("owner", string_property("Repository owner (e.g., 'octo-org')")),
                ("repo", string_property("Repository name (e.g., 'my-app')")),
            ],
            &["owner", "repo"],
        ),
        tool(
            "team_readiness",
            "Scan all repositories belonging to a team and produce an agent readiness summary. Identify the team by either its GitHub team slug or a repo name prefix (e.g., 'dp-'). Returns a table showing which repos have AGENTS.md, copilot-instructions.md, and copilot-setup-steps.yml.",
            &[
                ("org", string_property("GitHub organization (e.g., 'octo-org')")),
                (
                    "team",
                    string_property("GitHub team slug (e.g., 'platform'). Mutually exclusive with prefix."),
                ),
                (
                    "prefix",
                    string_property("Repo name prefix to match (e.g., 'dp-'). Mutually exclusive with team."),
                ),
            ],
            &["org"],
        ),
    ]
}

fn string_property(description: &str) -> PropertySchema {
    PropertySchema {
        property_type: "string".into(),
        description: Some(description.into()),
        enum_values: None,
    }
}

fn tool(
    name: &str,
    description: &str,
    properties: &[(&str, PropertySchema)],
    required: &[&str],
) -> ToolSchema {
    ToolSchema {
        name: name.into(),
        description: description.into(),
        input_schema: JsonSchema {
            schema_type: "object".into(),
            properties: properties
                .iter()
                .map(|(key, schema)| ((*key).to_owned(), schema.clone()))
                .collect(),
            required: required.iter().map(|r| (*r).to_owned()).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_catalogue_is_unique_and_objects() {
        let tools = get_tools();
        let mut names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), tools.len());
        assert!(tools.iter().all(|t| t.input_schema.schema_type == "object"));
        for t in &tools {
            for required in &t.input_schema.required {
                assert!(t.input_schema.properties.contains_key(required));
            }
        }
    }

    #[test]
    fn test_tool_response_omits_false_is_error() {
        let value = serde_json::to_value(ToolResponse::text("hi")).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "hi");
        assert!(value.get("isError").is_none());
    }
}
