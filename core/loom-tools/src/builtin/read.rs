use crate::sensitive_files;
use async_trait::async_trait;
use loom_protocol::ApprovalRequest;
use loom_protocol::PermissionResult;
use loom_tools_api::ContextModifier;
use loom_tools_api::FileReadState;
use loom_tools_api::Tool;
use loom_tools_api::ToolContext;
use loom_tools_api::ToolOutput;
use loom_tools_api::tool_error::ExecutionFailedSnafu;
use loom_tools_api::tool_error::InvalidInputSnafu;
use serde::Deserialize;
use serde_json::Value;

const MAX_LINES_DEFAULT: usize = 2000;

#[derive(Debug, Deserialize)]
struct ReadInput {
    file_path: String,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Reads a file, line-numbered like `cat -n`, recording what was read so
/// the Edit tool can detect a stale view of the same file later in the turn.
pub struct ReadTool;

impl ReadTool {
    pub fn new() -> Self {
        ReadTool
    }
}

impl Default for ReadTool {
    fn default() -> Self {
        ReadTool::new()
    }
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "Read"
    }

    fn description(&self) -> &str {
        "Reads a file from the local filesystem, optionally starting at a line offset with a line limit."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "offset": {"type": "integer", "minimum": 0},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["file_path"]
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn validate(&self, input: &Value) -> crate::ToolResult<()> {
        serde_json::from_value::<ReadInput>(input.clone())
            .map_err(|e| {
                InvalidInputSnafu {
                    message: format!("expected {{ file_path: string }}: {e}"),
                }
                .build()
            })
            .map(|_| ())
    }

    async fn check_permission(&self, input: &Value, ctx: &ToolContext) -> PermissionResult {
        let Ok(parsed) = serde_json::from_value::<ReadInput>(input.clone()) else {
            return PermissionResult::Allowed;
        };
        let path = ctx.resolve_path(&parsed.file_path);
        if sensitive_files::is_sensitive_file(&path) {
            return PermissionResult::NeedsApproval {
                request: ApprovalRequest {
                    request_id: ulid::Ulid::new().to_string(),
                    tool_name: self.name().to_string(),
                    description: format!("read sensitive file {}", path.display()),
                    risks: Vec::new(),
                    allow_remember: true,
                },
            };
        }
        PermissionResult::Allowed
    }

    async fn execute(&self, input: Value, ctx: &mut ToolContext) -> crate::ToolResult<ToolOutput> {
        let parsed: ReadInput = serde_json::from_value(input).map_err(|e| {
            InvalidInputSnafu {
                message: format!("expected {{ file_path: string }}: {e}"),
            }
            .build()
        })?;
        let path = ctx.resolve_path(&parsed.file_path);

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ExecutionFailedSnafu {
                message: format!("failed to read {}: {e}", path.display()),
            }
            .build()
        })?;
        let mtime = tokio::fs::metadata(&path)
            .await
            .ok()
            .and_then(|m| m.modified().ok());

        ctx.record_file_read_with_state(&path, FileReadState::complete(content.clone(), mtime))
            .await;

        let offset = parsed.offset.unwrap_or(0);
        let limit = parsed.limit.unwrap_or(MAX_LINES_DEFAULT);
        let numbered: String = content
            .lines()
            .enumerate()
            .skip(offset)
            .take(limit)
            .map(|(i, line)| format!("{:>6}\t{line}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolOutput {
            content: numbered,
            is_error: false,
            diff: None,
            modifiers: vec![ContextModifier::FileRead { path, content }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use ulid::Ulid;

    #[tokio::test]
    async fn execute_reads_and_numbers_lines() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("hello.txt");
        tokio::fs::write(&file, "one\ntwo\nthree\n").await.expect("write");

        let tool = ReadTool::new();
        let mut ctx = ToolContext::new(Ulid::new(), "call-1", dir.path().to_path_buf());
        let output = tool
            .execute(serde_json::json!({"file_path": "hello.txt"}), &mut ctx)
            .await
            .expect("read should succeed");

        assert!(output.content.contains("     1\tone"));
        assert!(ctx.was_file_read(&file).await);
    }

    #[tokio::test]
    async fn check_permission_requires_approval_for_dotenv() {
        let tool = ReadTool::new();
        let ctx = ToolContext::new(Ulid::new(), "call-1", PathBuf::from("/work"));
        let result = tool
            .check_permission(&serde_json::json!({"file_path": ".env"}), &ctx)
            .await;
        assert!(matches!(result, PermissionResult::NeedsApproval { .. }));
    }
}
