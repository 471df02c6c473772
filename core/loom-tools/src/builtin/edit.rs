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
struct EditInput {
    file_path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

/// Replaces an exact substring in a file that must already have been read
/// in this turn, by a hash on the content as it stood at read time — the
/// staleness check `check_permission` can't perform since it doesn't read
/// the file itself, so it's enforced in `execute`.
pub struct EditTool;

impl EditTool {
    pub fn new() -> Self {
        EditTool
    }
}

impl Default for EditTool {
    fn default() -> Self {
        EditTool::new()
    }
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "Edit"
    }

    fn description(&self) -> &str {
        "Replaces an exact occurrence of old_string with new_string in a file that has already been read."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "old_string": {"type": "string"},
                "new_string": {"type": "string"},
                "replace_all": {"type": "boolean"}
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    fn validate(&self, input: &Value) -> crate::ToolResult<()> {
        let parsed: EditInput = serde_json::from_value(input.clone()).map_err(|e| {
            InvalidInputSnafu {
                message: format!("expected {{ file_path, old_string, new_string }}: {e}"),
            }
            .build()
        })?;
        if parsed.old_string == parsed.new_string {
            return InvalidInputSnafu {
                message: "old_string and new_string must differ".to_string(),
            }
            .fail();
        }
        Ok(())
    }

    async fn check_permission(&self, input: &Value, ctx: &ToolContext) -> PermissionResult {
        let Ok(parsed) = serde_json::from_value::<EditInput>(input.clone()) else {
            return PermissionResult::Allowed;
        };
        let path = ctx.resolve_path(&parsed.file_path);

        if sensitive_files::is_locked_directory(&path) {
            return PermissionResult::Denied {
                reason: format!("{} is inside a version-control directory", path.display()),
            };
        }
        if sensitive_files::is_sensitive_file(&path) {
            return PermissionResult::NeedsApproval {
                request: ApprovalRequest {
                    request_id: ulid::Ulid::new().to_string(),
                    tool_name: self.name().to_string(),
                    description: format!("edit sensitive file {}", path.display()),
                    risks: Vec::new(),
                    allow_remember: true,
                },
            };
        }
        PermissionResult::Allowed
    }

    async fn execute(&self, input: Value, ctx: &mut ToolContext) -> crate::ToolResult<ToolOutput> {
        let parsed: EditInput = serde_json::from_value(input).map_err(|e| {
            InvalidInputSnafu {
                message: format!("expected {{ file_path, old_string, new_string }}: {e}"),
            }
            .build()
        })?;
        let path = ctx.resolve_path(&parsed.file_path);

        let recorded = ctx.file_read_state(&path).await;
        let Some(recorded) = recorded else {
            return ExecutionFailedSnafu {
                message: format!("{} must be read before it can be edited", path.display()),
            }
            .fail();
        };

        let current = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ExecutionFailedSnafu {
                message: format!("failed to read {}: {e}", path.display()),
            }
            .build()
        })?;

        if let Some(expected_hash) = recorded.content_hash {
            if FileReadState::compute_hash(&current) != expected_hash {
                return ExecutionFailedSnafu {
                    message: format!(
                        "{} has changed on disk since it was last read",
                        path.display()
                    ),
                }
                .fail();
            }
        }

        let occurrences = current.matches(parsed.old_string.as_str()).count();
        if occurrences == 0 {
            return ExecutionFailedSnafu {
                message: "old_string was not found in the file".to_string(),
            }
            .fail();
        }
        if occurrences > 1 && !parsed.replace_all {
            return ExecutionFailedSnafu {
                message: format!(
                    "old_string matches {occurrences} locations; pass replace_all or narrow the match"
                ),
            }
            .fail();
        }

        let updated = if parsed.replace_all {
            current.replace(parsed.old_string.as_str(), &parsed.new_string)
        } else {
            current.replacen(parsed.old_string.as_str(), &parsed.new_string, 1)
        };

        tokio::fs::write(&path, &updated).await.map_err(|e| {
            ExecutionFailedSnafu {
                message: format!("failed to write {}: {e}", path.display()),
            }
            .build()
        })?;

        let diff = TextDiff::from_lines(&current, &updated)
            .unified_diff()
            .header(&parsed.file_path, &parsed.file_path)
            .to_string();

        ctx.record_file_read_with_state(&path, FileReadState::complete(updated.clone(), None))
            .await;

        Ok(ToolOutput {
            content: format!("updated {}", path.display()),
            is_error: false,
            diff: Some(diff),
            modifiers: vec![ContextModifier::FileRead {
                path,
                content: updated,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use ulid::Ulid;

    async fn read_and_record(ctx: &ToolContext, path: &std::path::Path) {
        let content = tokio::fs::read_to_string(path).await.expect("read");
        ctx.record_file_read_with_state(path, FileReadState::complete(content, None))
            .await;
    }

    #[tokio::test]
    async fn execute_fails_without_prior_read() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, "hello world").await.expect("write");

        let tool = EditTool::new();
        let mut ctx = ToolContext::new(Ulid::new(), "call-1", dir.path().to_path_buf());
        let result = tool
            .execute(
                serde_json::json!({"file_path": "a.txt", "old_string": "hello", "new_string": "bye"}),
                &mut ctx,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn execute_replaces_single_occurrence_after_read() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, "hello world").await.expect("write");

        let tool = EditTool::new();
        let mut ctx = ToolContext::new(Ulid::new(), "call-1", dir.path().to_path_buf());
        read_and_record(&ctx, &file).await;

        let output = tool
            .execute(
                serde_json::json!({"file_path": "a.txt", "old_string": "hello", "new_string": "bye"}),
                &mut ctx,
            )
            .await
            .expect("edit should succeed");
        assert!(!output.is_error);

        let updated = tokio::fs::read_to_string(&file).await.expect("read back");
        assert_eq!(updated, "bye world");
    }

    #[tokio::test]
    async fn execute_rejects_stale_read() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, "hello world").await.expect("write");

        let tool = EditTool::new();
        let mut ctx = ToolContext::new(Ulid::new(), "call-1", dir.path().to_path_buf());
        read_and_record(&ctx, &file).await;

        tokio::fs::write(&file, "changed out from under us").await.expect("external write");

        let result = tool
            .execute(
                serde_json::json!({"file_path": "a.txt", "old_string": "hello", "new_string": "bye"}),
                &mut ctx,
            )
            .await;
        assert!(result.is_err());
    }
}
