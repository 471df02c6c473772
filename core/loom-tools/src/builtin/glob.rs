use async_trait::async_trait;
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use loom_tools_api::Tool;
use loom_tools_api::ToolContext;
use loom_tools_api::ToolOutput;
use loom_tools_api::tool_error::ExecutionFailedSnafu;
use loom_tools_api::tool_error::InvalidInputSnafu;
use serde::Deserialize;
use serde_json::Value;

const MAX_RESULTS: usize = 1000;

#[derive(Debug, Deserialize)]
struct GlobInput {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
}

/// Finds files by glob pattern, respecting `.gitignore` the way the rest
/// of the tool suite's directory walks do.
pub struct GlobTool;

impl GlobTool {
    pub fn new() -> Self {
        GlobTool
    }
}

impl Default for GlobTool {
    fn default() -> Self {
        GlobTool::new()
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "Glob"
    }

    fn description(&self) -> &str {
        "Finds files matching a glob pattern, returning paths sorted by modification time (newest first)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string"}
            },
            "required": ["pattern"]
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn validate(&self, input: &Value) -> crate::ToolResult<()> {
        serde_json::from_value::<GlobInput>(input.clone())
            .map_err(|e| {
                InvalidInputSnafu {
                    message: format!("expected {{ pattern: string }}: {e}"),
                }
                .build()
            })
            .map(|_| ())
    }

    async fn execute(&self, input: Value, ctx: &mut ToolContext) -> crate::ToolResult<ToolOutput> {
        let parsed: GlobInput = serde_json::from_value(input).map_err(|e| {
            InvalidInputSnafu {
                message: format!("expected {{ pattern: string }}: {e}"),
            }
            .build()
        })?;
        let root = match &parsed.path {
            Some(p) => ctx.resolve_path(p),
            None => ctx.cwd.clone(),
        };

        let mut overrides = OverrideBuilder::new(&root);
        overrides.add(&parsed.pattern).map_err(|e| {
            InvalidInputSnafu {
                message: format!("invalid glob pattern: {}: {e}", parsed.pattern),
            }
            .build()
        })?;
        let overrides = overrides.build().map_err(|e| {
            InvalidInputSnafu {
                message: format!("invalid glob pattern: {}: {e}", parsed.pattern),
            }
            .build()
        })?;

        let walker = WalkBuilder::new(&root).overrides(overrides).build();

        let mut entries: Vec<(std::path::PathBuf, std::time::SystemTime)> = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                ExecutionFailedSnafu {
                    message: format!("failed while walking directory tree: {e}"),
                }
                .build()
            })?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(std::time::UNIX_EPOCH);
                entries.push((entry.into_path(), modified));
            }
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(MAX_RESULTS);

        let content = entries
            .iter()
            .map(|(path, _)| path.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolOutput::text(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use ulid::Ulid;

    #[tokio::test]
    async fn execute_matches_extension_pattern() {
        let dir = tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("a.rs"), "").await.expect("write");
        tokio::fs::write(dir.path().join("b.txt"), "").await.expect("write");

        let tool = GlobTool::new();
        let mut ctx = ToolContext::new(Ulid::new(), "call-1", dir.path().to_path_buf());
        let output = tool
            .execute(serde_json::json!({"pattern": "*.rs"}), &mut ctx)
            .await
            .expect("glob should succeed");

        assert!(output.content.ends_with("a.rs"));
        assert!(!output.content.contains("b.txt"));
    }
}
