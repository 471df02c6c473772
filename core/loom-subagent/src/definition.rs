use loom_protocol::AgentProfile;
use loom_protocol::PermissionMode;

/// Which tools a subagent profile may call. `All` still runs through
/// [`crate::tool_filter::ToolFilter`], which blocks recursive spawning and
/// todo-list management regardless of this setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAccess {
    All,
    List(Vec<String>),
}

impl ToolAccess {
    pub fn allows(&self, tool_name: &str) -> bool {
        match self {
            ToolAccess::All => true,
            ToolAccess::List(names) => names.iter().any(|n| n == tool_name),
        }
    }
}

/// A named agent profile available to the Task tool, plus the dispatch
/// metadata that isn't part of [`AgentProfile`] itself (whether it may be
/// spawned at all, and the default turn budget a spawn gets if the caller
/// doesn't supply one).
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub profile: AgentProfile,
    pub description: String,
    pub tool_access: ToolAccess,
    /// Whether the Task tool is allowed to spawn this agent. The
    /// interactive root agent is registered (so its profile can be looked
    /// up by name for other purposes) but is not spawnable.
    pub spawnable: bool,
    pub default_max_turns: i32,
}

impl AgentDefinition {
    pub fn builtin(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        tool_access: ToolAccess,
    ) -> Self {
        let name = name.into();
        AgentDefinition {
            profile: AgentProfile {
                name: name.clone(),
                system_prompt: system_prompt.into(),
                tools: match &tool_access {
                    ToolAccess::All => Vec::new(),
                    ToolAccess::List(names) => names.clone(),
                },
                model: None,
                permission_mode: PermissionMode::BypassPermissions,
                category_permissions: loom_protocol::CategoryPermissions::default(),
                permission_rules: Vec::new(),
            },
            description: description.into(),
            tool_access,
            spawnable: true,
            default_max_turns: 25,
        }
    }
}
