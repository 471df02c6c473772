use async_trait::async_trait;
use grep_regex::RegexMatcherBuilder;
use grep_searcher::Searcher;
use grep_searcher::sinks::UTF8;
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use loom_tools_api::Tool;
use loom_tools_api::ToolContext;
use loom_tools_api::ToolOutput;
use loom_tools_api::tool_error::ExecutionFailedSnafu;
use loom_tools_api::tool_error::InvalidInputSnafu;
use serde::Deserialize;
use serde_json::Value;

const MAX_MATCHES: usize = 500;

#[derive(Debug, Deserialize)]
struct GrepInput {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    glob: Option<String>,
    #[serde(default)]
    case_insensitive: bool,
}

/// Searches file contents with a regular expression, walking the tree the
/// same `.gitignore`-respecting way `Glob` does and optionally restricting
/// which files are searched with a glob filter.
pub struct GrepTool;

impl GrepTool {
    pub fn new() -> Self {
        GrepTool
    }
}

impl Default for GrepTool {
    fn default() -> Self {
        GrepTool::new()
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "Grep"
    }

    fn description(&self) -> &str {
        "Searches file contents with a regular expression and returns matching lines as path:line:text."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string"},
                "glob": {"type": "string"},
                "case_insensitive": {"type": "boolean"}
            },
            "required": ["pattern"]
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn validate(&self, input: &Value) -> crate::ToolResult<()> {
        serde_json::from_value::<GrepInput>(input.clone())
            .map_err(|e| {
                InvalidInputSnafu {
                    message: format!("expected {{ pattern: string }}: {e}"),
                }
                .build()
            })
            .map(|_| ())
    }

    async fn execute(&self, input: Value, ctx: &mut ToolContext) -> crate::ToolResult<ToolOutput> {
        let parsed: GrepInput = serde_json::from_value(input).map_err(|e| {
            InvalidInputSnafu {
                message: format!("expected {{ pattern: string }}: {e}"),
            }
            .build()
        })?;
        let root = match &parsed.path {
            Some(p) => ctx.resolve_path(p),
            None => ctx.cwd.clone(),
        };

        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(parsed.case_insensitive)
            .build(&parsed.pattern)
            .map_err(|e| {
                InvalidInputSnafu {
                    message: format!("invalid regex: {}: {e}", parsed.pattern),
                }
                .build()
            })?;

        let mut walk_builder = WalkBuilder::new(&root);
        if let Some(glob) = &parsed.glob {
            let mut overrides = OverrideBuilder::new(&root);
            overrides.add(glob).map_err(|e| {
                InvalidInputSnafu {
                    message: format!("invalid glob filter: {glob}: {e}"),
                }
                .build()
            })?;
            let overrides = overrides.build().map_err(|e| {
                InvalidInputSnafu {
                    message: format!("invalid glob filter: {glob}: {e}"),
                }
                .build()
            })?;
            walk_builder.overrides(overrides);
        }

        let mut matches: Vec<String> = Vec::new();
        'walk: for entry in walk_builder.build() {
            let entry = entry.map_err(|e| {
                ExecutionFailedSnafu {
                    message: format!("failed while walking directory tree: {e}"),
                }
                .build()
            })?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path().to_path_buf();
            let display_path = path.display().to_string();

            let search_result = Searcher::new().search_path(
                &matcher,
                &path,
                UTF8(|line_number, line| {
                    matches.push(format!("{display_path}:{line_number}:{}", line.trim_end()));
                    Ok(matches.len() < MAX_MATCHES)
                }),
            );
            // Binary or unreadable files are skipped rather than failing the whole search.
            let _ = search_result;

            if matches.len() >= MAX_MATCHES {
                break 'walk;
            }
        }

        Ok(ToolOutput::text(matches.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use ulid::Ulid;

    #[tokio::test]
    async fn execute_finds_matching_line() {
        let dir = tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("a.txt"), "hello\nneedle here\nbye\n")
            .await
            .expect("write");

        let tool = GrepTool::new();
        let mut ctx = ToolContext::new(Ulid::new(), "call-1", dir.path().to_path_buf());
        let output = tool
            .execute(serde_json::json!({"pattern": "needle"}), &mut ctx)
            .await
            .expect("grep should succeed");

        assert!(output.content.contains("a.txt:2:needle here"));
    }

    #[tokio::test]
    async fn execute_respects_glob_filter() {
        let dir = tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("a.rs"), "needle").await.expect("write");
        tokio::fs::write(dir.path().join("b.md"), "needle").await.expect("write");

        let tool = GrepTool::new();
        let mut ctx = ToolContext::new(Ulid::new(), "call-1", dir.path().to_path_buf());
        let output = tool
            .execute(
                serde_json::json!({"pattern": "needle", "glob": "*.rs"}),
                &mut ctx,
            )
            .await
            .expect("grep should succeed");

        assert!(output.content.contains("a.rs"));
        assert!(!output.content.contains("b.md"));
    }
}
