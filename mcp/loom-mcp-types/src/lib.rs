//! Wire-adjacent types for the Model Context Protocol bridge: tool and
//! resource descriptors as the bridge exposes them to the rest of the
//! processing loop, independent of whichever transport (`rmcp`) carried
//! them over the wire.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// The MCP protocol revision this bridge speaks. A server reporting a
/// different revision at `initialize` time is not accommodated — the
/// connection fails closed rather than guessing at compatibility.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpContentBlock {
    Text { text: String },
    Image { data: String, mime_type: String },
    Resource { uri: String, text: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpCallResult {
    pub content: Vec<McpContentBlock>,
    #[serde(default)]
    pub is_error: bool,
}

impl McpCallResult {
    /// Flattens the content blocks into the plain text a `ToolOutput`
    /// wants, the way the bridge hands a completed call back to the Tool
    /// Executor.
    pub fn to_text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                McpContentBlock::Text { text } => text.clone(),
                McpContentBlock::Image { mime_type, .. } => format!("[image: {mime_type}]"),
                McpContentBlock::Resource { uri, text } => {
                    text.clone().unwrap_or_else(|| format!("[resource: {uri}]"))
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Prefixes a server-reported tool name for exposure in the session's own
/// tool registry, so `search` from two different servers never collides.
pub fn prefixed_tool_name(server_name: &str, tool_name: &str) -> String {
    format!("{server_name}_{tool_name}")
}

/// Splits a prefixed tool name back into `(server_name, tool_name)`, if it
/// was produced by [`prefixed_tool_name`] for one of `known_servers`.
pub fn split_prefixed_tool_name<'a>(
    prefixed: &'a str,
    known_servers: &[String],
) -> Option<(&'a str, &'a str)> {
    known_servers.iter().find_map(|server| {
        prefixed
            .strip_prefix(server.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .map(|tool| (server.as_str(), tool))
    })
}

/// Addresses a resource exposed by a specific server, e.g.
/// `mcp://docs/file:///README.md`.
pub fn resource_address(server_name: &str, uri: &str) -> String {
    format!("mcp://{server_name}/{uri}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_round_trips() {
        let prefixed = prefixed_tool_name("docs", "search");
        assert_eq!(prefixed, "docs_search");
        let servers = vec!["docs".to_string()];
        assert_eq!(
            split_prefixed_tool_name(&prefixed, &servers),
            Some(("docs", "search"))
        );
    }

    #[test]
    fn to_text_joins_blocks() {
        let result = McpCallResult {
            content: vec![
                McpContentBlock::Text {
                    text: "first".to_string(),
                },
                McpContentBlock::Text {
                    text: "second".to_string(),
                },
            ],
            is_error: false,
        };
        assert_eq!(result.to_text(), "first\nsecond");
    }
}
