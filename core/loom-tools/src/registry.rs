use loom_protocol::ToolDefinition;
use loom_tools_api::Tool;
use std::collections::HashMap;
use std::sync::Arc;

/// Holds every tool available to a session: the built-ins the Tool
/// Executor dispatches directly plus, once connected, MCP-exposed tools
/// registered under a `<server>_<tool>` name by the MCP Bridge.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn unregister(&mut self, name: &str) {
        self.tools.remove(name);
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Populate a registry with the built-in tool set used by top-level
    /// sessions. Subagent profiles (see `loom-subagent`) start from a
    /// filtered copy of this rather than building their own.
    pub fn with_builtins() -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(crate::builtin::BashTool::new()));
        registry.register(Arc::new(crate::builtin::ReadTool::new()));
        registry.register(Arc::new(crate::builtin::WriteTool::new()));
        registry.register(Arc::new(crate::builtin::EditTool::new()));
        registry.register(Arc::new(crate::builtin::GlobTool::new()));
        registry.register(Arc::new(crate::builtin::GrepTool::new()));
        registry.register(Arc::new(crate::builtin::TaskTool::new()));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_builtins_registers_all_seven_tools() {
        let registry = ToolRegistry::with_builtins();
        let mut names = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec!["Bash", "Edit", "Glob", "Grep", "Read", "Task", "Write"]
        );
    }

    #[test]
    fn unregister_removes_a_tool() {
        let mut registry = ToolRegistry::with_builtins();
        registry.unregister("Bash");
        assert!(registry.get("Bash").is_none());
    }
}
