use async_trait::async_trait;
use loom_tools_api::SpawnAgentInput;
use loom_tools_api::Tool;
use loom_tools_api::ToolContext;
use loom_tools_api::ToolOutput;
use loom_tools_api::tool_error::ExecutionFailedSnafu;
use loom_tools_api::tool_error::InvalidInputSnafu;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct TaskInput {
    agent_type: String,
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    max_turns: Option<i32>,
}

/// Delegates a self-contained piece of work to a subagent, running its own
/// recursive agentic loop under a named agent profile (e.g. `explore`,
/// `plan`) and returning that subagent's final text. Requires a
/// [`loom_tools_api::SubagentSpawner`] to have been wired into the
/// [`ToolContext`] — without one, `execute` fails immediately rather than
/// recursing into itself.
pub struct TaskTool;

impl TaskTool {
    pub fn new() -> Self {
        TaskTool
    }
}

impl Default for TaskTool {
    fn default() -> Self {
        TaskTool::new()
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "Task"
    }

    fn description(&self) -> &str {
        "Spawns a subagent under a named profile to carry out a self-contained task and returns its result."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "agent_type": {"type": "string"},
                "prompt": {"type": "string"},
                "model": {"type": "string"},
                "max_turns": {"type": "integer", "minimum": 1}
            },
            "required": ["agent_type", "prompt"]
        })
    }

    fn validate(&self, input: &Value) -> crate::ToolResult<()> {
        let parsed: TaskInput = serde_json::from_value(input.clone()).map_err(|e| {
            InvalidInputSnafu {
                message: format!("expected {{ agent_type: string, prompt: string }}: {e}"),
            }
            .build()
        })?;
        if parsed.prompt.trim().is_empty() {
            return InvalidInputSnafu {
                message: "prompt must not be empty".to_string(),
            }
            .fail();
        }
        Ok(())
    }

    async fn execute(&self, input: Value, ctx: &mut ToolContext) -> crate::ToolResult<ToolOutput> {
        let parsed: TaskInput = serde_json::from_value(input).map_err(|e| {
            InvalidInputSnafu {
                message: format!("expected {{ agent_type: string, prompt: string }}: {e}"),
            }
            .build()
        })?;

        if !ctx.can_spawn_agent() {
            return ExecutionFailedSnafu {
                message: "no subagent spawner configured for this session".to_string(),
            }
            .fail();
        }

        let result = ctx
            .spawn_agent(SpawnAgentInput {
                agent_type: parsed.agent_type,
                prompt: parsed.prompt,
                model: parsed.model,
                max_turns: parsed.max_turns,
            })
            .await
            .map_err(|err| {
                ExecutionFailedSnafu {
                    message: format!("subagent run failed: {err}"),
                }
                .build()
            })?;

        Ok(ToolOutput::text(result.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use ulid::Ulid;

    #[test]
    fn validate_rejects_empty_prompt() {
        let tool = TaskTool::new();
        let result = tool.validate(&serde_json::json!({"agent_type": "explore", "prompt": "  "}));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn execute_fails_without_a_configured_spawner() {
        let tool = TaskTool::new();
        let mut ctx = ToolContext::new(Ulid::new(), "call-1", PathBuf::from("/work"));
        let result = tool
            .execute(
                serde_json::json!({"agent_type": "explore", "prompt": "look around"}),
                &mut ctx,
            )
            .await;
        assert!(result.is_err());
    }
}
