use crate::EnvironmentInfo;
use crate::error::BuildSnafu;
use crate::error::Result;
use loom_protocol::PermissionMode;

/// Token budget derived from the active model's context window, used by
/// the Compactor to decide when a Tier-2 summarization pass is due.
#[derive(Debug, Clone, Copy)]
pub struct ContextBudget {
    pub context_window: i32,
    pub max_output_tokens: i32,
    pub compact_token_threshold: u32,
}

impl ContextBudget {
    pub fn new(context_window: i32, max_output_tokens: i32) -> Self {
        ContextBudget {
            context_window,
            max_output_tokens,
            compact_token_threshold: loom_config::DEFAULT_COMPACT_TOKEN_THRESHOLD,
        }
    }

    pub fn with_compact_threshold(mut self, threshold: u32) -> Self {
        self.compact_token_threshold = threshold;
        self
    }
}

/// A loaded `CLAUDE.md`/`AGENTS.md`-style memory file injected into the
/// Environment or Memory Files prompt section.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    pub path: std::path::PathBuf,
    pub content: String,
}

/// Everything the System Prompt Builder and the Tool Executor need to
/// know about the current session: what model/environment it's running
/// against, which tools and MCP servers are available, and the session's
/// permission posture.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub environment: EnvironmentInfo,
    pub budget: ContextBudget,
    pub tool_names: Vec<String>,
    pub mcp_server_names: Vec<String>,
    pub memory_files: Vec<MemoryFile>,
    pub permission_mode: PermissionMode,
    pub subagent_type: Option<String>,
}

impl ConversationContext {
    pub fn builder() -> ConversationContextBuilder {
        ConversationContextBuilder::default()
    }

    pub fn has_tools(&self) -> bool {
        !self.tool_names.is_empty()
    }

    pub fn has_mcp_servers(&self) -> bool {
        !self.mcp_server_names.is_empty()
    }

    pub fn is_subagent(&self) -> bool {
        self.subagent_type.is_some()
    }
}

#[derive(Debug, Default)]
pub struct ConversationContextBuilder {
    environment: Option<EnvironmentInfo>,
    budget: Option<ContextBudget>,
    tool_names: Vec<String>,
    mcp_server_names: Vec<String>,
    memory_files: Vec<MemoryFile>,
    permission_mode: Option<PermissionMode>,
    subagent_type: Option<String>,
}

impl ConversationContextBuilder {
    pub fn environment(mut self, environment: EnvironmentInfo) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn budget(mut self, budget: ContextBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn tool_names(mut self, tool_names: Vec<String>) -> Self {
        self.tool_names = tool_names;
        self
    }

    pub fn mcp_server_names(mut self, mcp_server_names: Vec<String>) -> Self {
        self.mcp_server_names = mcp_server_names;
        self
    }

    pub fn memory_files(mut self, memory_files: Vec<MemoryFile>) -> Self {
        self.memory_files = memory_files;
        self
    }

    pub fn permission_mode(mut self, permission_mode: PermissionMode) -> Self {
        self.permission_mode = Some(permission_mode);
        self
    }

    pub fn subagent_type(mut self, subagent_type: impl Into<String>) -> Self {
        self.subagent_type = Some(subagent_type.into());
        self
    }

    pub fn build(self) -> Result<ConversationContext> {
        let environment = self.environment.ok_or_else(|| {
            BuildSnafu {
                message: "environment is required",
            }
            .build()
        })?;
        let budget = self
            .budget
            .unwrap_or_else(|| ContextBudget::new(environment.context_window, environment.max_output_tokens));
        Ok(ConversationContext {
            environment,
            budget,
            tool_names: self.tool_names,
            mcp_server_names: self.mcp_server_names,
            memory_files: self.memory_files,
            permission_mode: self.permission_mode.unwrap_or(PermissionMode::Default),
            subagent_type: self.subagent_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> EnvironmentInfo {
        EnvironmentInfo::builder()
            .cwd(std::path::PathBuf::from("/work"))
            .model("test-model")
            .build()
            .unwrap()
    }

    #[test]
    fn build_requires_environment() {
        assert!(ConversationContext::builder().build().is_err());
    }

    #[test]
    fn has_tools_reflects_tool_names() {
        let ctx = ConversationContext::builder()
            .environment(env())
            .tool_names(vec!["Bash".to_string()])
            .build()
            .unwrap();
        assert!(ctx.has_tools());
        assert!(!ctx.has_mcp_servers());
    }

    #[test]
    fn budget_defaults_from_environment_window() {
        let ctx = ConversationContext::builder().environment(env()).build().unwrap();
        assert_eq!(ctx.budget.context_window, 200_000);
    }
}
