use crate::definition::AgentDefinition;

/// Blocked for every subagent regardless of its own tool list: spawning is
/// the Task Dispatcher's job, not a subagent's, and the todo list is the
/// root agent's own bookkeeping.
pub const ALWAYS_BLOCKED_TOOLS: &[&str] = &["Task", "TodoWrite", "TodoRead"];

/// Resolves whether a subagent may call a given tool: the always-blocked
/// tier first, then the agent definition's own allow list.
#[derive(Debug, Clone)]
pub struct ToolFilter {
    tool_access: crate::definition::ToolAccess,
}

impl ToolFilter {
    pub fn new(definition: &AgentDefinition) -> Self {
        ToolFilter {
            tool_access: definition.tool_access.clone(),
        }
    }

    pub fn is_allowed(&self, tool_name: &str) -> bool {
        if ALWAYS_BLOCKED_TOOLS.contains(&tool_name) {
            return false;
        }
        self.tool_access.allows(tool_name)
    }

    pub fn filter_tools<'a>(&self, tools: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        tools.filter(|t| self.is_allowed(t)).collect()
    }

    pub fn rejection_reason(&self, tool_name: &str) -> Option<String> {
        if ALWAYS_BLOCKED_TOOLS.contains(&tool_name) {
            return Some(format!(
                "tool '{tool_name}' is always blocked for subagents"
            ));
        }
        if !self.tool_access.allows(tool_name) {
            return Some(format!(
                "tool '{tool_name}' is not in this agent's allowed tools"
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ToolAccess;

    #[test]
    fn task_and_todo_are_blocked_even_with_all_access() {
        let definition = AgentDefinition::builtin("explore", "d", "p", ToolAccess::All);
        let filter = ToolFilter::new(&definition);
        assert!(!filter.is_allowed("Task"));
        assert!(!filter.is_allowed("TodoWrite"));
        assert!(filter.is_allowed("Read"));
    }

    #[test]
    fn list_access_restricts_to_named_tools() {
        let definition = AgentDefinition::builtin(
            "explore",
            "d",
            "p",
            ToolAccess::List(vec!["Read".to_string(), "Grep".to_string()]),
        );
        let filter = ToolFilter::new(&definition);
        assert!(filter.is_allowed("Read"));
        assert!(!filter.is_allowed("Write"));
        assert!(filter.rejection_reason("Write").is_some());
    }
}
