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
use similar::TextDiff;

#[derive(Debug, Deserialize)]
struct WriteInput {
    file_path: String,
    content: String,
}

/// Creates a file or overwrites it wholesale. Unlike `Edit`, `Write` does
/// not require the file to have been read first — it's the tool for "put
/// this new content here", not "change what's already there".
pub struct WriteTool;

impl WriteTool {
    pub fn new() -> Self {
        WriteTool
    }
}

impl Default for WriteTool {
    fn default() -> Self {
        WriteTool::new()
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "Write"
    }

    fn description(&self) -> &str {
        "Writes content to a file, creating it if it doesn't exist and overwriting it if it does."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["file_path", "content"]
        })
    }

    fn validate(&self, input: &Value) -> crate::ToolResult<()> {
        serde_json::from_value::<WriteInput>(input.clone())
            .map_err(|e| {
                InvalidInputSnafu {
                    message: format!("expected {{ file_path: string, content: string }}: {e}"),
                }
                .build()
            })
            .map(|_| ())
    }

    async fn check_permission(&self, input: &Value, ctx: &ToolContext) -> PermissionResult {
        let Ok(parsed) = serde_json::from_value::<WriteInput>(input.clone()) else {
            return PermissionResult::Allowed;
        };
        let path = ctx.resolve_path(&parsed.file_path);

        if sensitive_files::is_locked_directory(&path) {
            return PermissionResult::Denied {
                reason: format!("{} is inside a version-control directory", path.display()),
            };
        }
        if sensitive_files::is_sensitive_file(&path)
            || sensitive_files::is_outside_cwd(&path, &ctx.cwd)
        {
            return PermissionResult::NeedsApproval {
                request: ApprovalRequest {
                    request_id: ulid::Ulid::new().to_string(),
                    tool_name: self.name().to_string(),
                    description: format!("write to {}", path.display()),
                    risks: Vec::new(),
                    allow_remember: true,
                },
            };
        }
        PermissionResult::Allowed
    }

    async fn execute(&self, input: Value, ctx: &mut ToolContext) -> crate::ToolResult<ToolOutput> {
        let parsed: WriteInput = serde_json::from_value(input).map_err(|e| {
            InvalidInputSnafu {
                message: format!("expected {{ file_path: string, content: string }}: {e}"),
            }
            .build()
        })?;
        let path = ctx.resolve_path(&parsed.file_path);

        let previous = tokio::fs::read_to_string(&path).await.unwrap_or_default();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ExecutionFailedSnafu {
                    message: format!("failed to create parent directory for {}: {e}", path.display()),
                }
                .build()
            })?;
        }
        tokio::fs::write(&path, &parsed.content).await.map_err(|e| {
            ExecutionFailedSnafu {
                message: format!("failed to write {}: {e}", path.display()),
            }
            .build()
        })?;

        let diff = TextDiff::from_lines(&previous, &parsed.content)
            .unified_diff()
            .header(&parsed.file_path, &parsed.file_path)
            .to_string();

        ctx.record_file_read_with_state(
            &path,
            FileReadState::complete(parsed.content.clone(), None),
        )
        .await;

        Ok(ToolOutput {
            content: format!("wrote {} bytes to {}", parsed.content.len(), path.display()),
            is_error: false,
            diff: Some(diff),
            modifiers: vec![ContextModifier::FileRead {
                path,
                content: parsed.content,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use ulid::Ulid;

    #[tokio::test]
    async fn execute_creates_new_file() {
        let dir = tempdir().expect("tempdir");
        let tool = WriteTool::new();
        let mut ctx = ToolContext::new(Ulid::new(), "call-1", dir.path().to_path_buf());

        let output = tool
            .execute(
                serde_json::json!({"file_path": "new.txt", "content": "hello\n"}),
                &mut ctx,
            )
            .await
            .expect("write should succeed");

        assert!(!output.is_error);
        let written = tokio::fs::read_to_string(dir.path().join("new.txt"))
            .await
            .expect("file should exist");
        assert_eq!(written, "hello\n");
    }

    #[tokio::test]
    async fn check_permission_denies_write_under_git_dir() {
        let tool = WriteTool::new();
        let dir = tempdir().expect("tempdir");
        let ctx = ToolContext::new(Ulid::new(), "call-1", dir.path().to_path_buf());
        let result = tool
            .check_permission(
                &serde_json::json!({"file_path": ".git/config", "content": "x"}),
                &ctx,
            )
            .await;
        assert!(matches!(result, PermissionResult::Denied { .. }));
    }
}
