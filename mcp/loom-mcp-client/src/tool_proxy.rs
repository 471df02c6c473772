use crate::bridge::McpBridge;
use async_trait::async_trait;
use loom_tools_api::Tool;
use loom_tools_api::ToolContext;
use loom_tools_api::ToolError;
use loom_tools_api::ToolOutput;
use loom_tools_api::tool_error::ExecutionFailedSnafu;
use serde_json::Value;

/// Adapts one MCP server's tool into the session's [`loom_tools_api::Tool`]
/// registry, so the Tool Executor dispatches it through the same five-stage
/// pipeline as a built-in. Registered under the `<server>_<tool>` name;
/// `execute` forwards the call to the bridge and flattens the result's
/// content blocks into plain text.
pub struct McpToolProxy {
    bridge: McpBridge,
    registry_name: String,
    server: String,
    tool: String,
    description: String,
    input_schema: Value,
}

impl McpToolProxy {
    pub fn new(
        bridge: McpBridge,
        server: impl Into<String>,
        tool: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        let server = server.into();
        let tool = tool.into();
        let registry_name = loom_mcp_types::prefixed_tool_name(&server, &tool);
        McpToolProxy {
            bridge,
            registry_name,
            server,
            tool,
            description: description.into(),
            input_schema,
        }
    }
}

#[async_trait]
impl Tool for McpToolProxy {
    fn name(&self) -> &str {
        &self.registry_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn execute(
        &self,
        input: Value,
        _ctx: &mut ToolContext,
    ) -> std::result::Result<ToolOutput, ToolError> {
        let result = self
            .bridge
            .call_tool(&self.server, &self.tool, input)
            .await
            .map_err(|e| {
                ExecutionFailedSnafu {
                    message: format!("call to MCP server {} failed: {e}", self.server),
                }
                .build()
            })?;

        Ok(ToolOutput {
            content: result.to_text(),
            is_error: result.is_error,
            diff: None,
            modifiers: Vec::new(),
        })
    }
}
