use crate::definition::AgentDefinition;
use crate::definition::ToolAccess;
use crate::error::AgentNotFoundSnafu;
use crate::error::NotSpawnableSnafu;
use crate::error::Result;
use snafu::OptionExt;
use std::collections::HashMap;

const EXPLORE_PROMPT: &str = "You are a read-only research subagent. Investigate the codebase \
to answer the question you were given and report findings; you cannot modify files.";

const PLAN_PROMPT: &str = "You are a planning subagent. Read whatever is necessary to produce \
a concrete, stepwise implementation plan; you cannot modify files other than writing the plan.";

const GENERAL_PURPOSE_PROMPT: &str = "You are a general-purpose subagent. Carry out the task \
you were given using the tools available to you and report the result.";

/// Agent profiles the Task tool can spawn by name. Seeded with three
/// built-ins on construction; callers may register additional custom
/// definitions (e.g. loaded from project configuration) with `register`.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    definitions: HashMap<String, AgentDefinition>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        let mut registry = AgentRegistry {
            definitions: HashMap::new(),
        };
        registry.register(AgentDefinition::builtin(
            "explore",
            "Investigates the codebase read-only and reports findings.",
            EXPLORE_PROMPT,
            ToolAccess::List(vec![
                "Read".to_string(),
                "Grep".to_string(),
                "Glob".to_string(),
            ]),
        ));
        registry.register(AgentDefinition::builtin(
            "plan",
            "Produces an implementation plan without making code changes.",
            PLAN_PROMPT,
            ToolAccess::List(vec![
                "Read".to_string(),
                "Grep".to_string(),
                "Glob".to_string(),
                "Write".to_string(),
            ]),
        ));
        registry.register(AgentDefinition::builtin(
            "general-purpose",
            "Carries out a self-contained task with the full tool set.",
            GENERAL_PURPOSE_PROMPT,
            ToolAccess::All,
        ));
        registry
    }

    pub fn register(&mut self, definition: AgentDefinition) {
        self.definitions.insert(definition.profile.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&AgentDefinition> {
        self.definitions.get(name)
    }

    /// Resolves `name` for spawning, rejecting both unknown agents and
    /// agents registered but marked non-spawnable.
    pub fn resolve_spawnable(&self, name: &str) -> Result<&AgentDefinition> {
        let definition = self.get(name).context(AgentNotFoundSnafu { name })?;
        if !definition.spawnable {
            return NotSpawnableSnafu { name }.fail();
        }
        Ok(definition)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        AgentRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_agents_are_registered() {
        let registry = AgentRegistry::new();
        assert!(registry.get("explore").is_some());
        assert!(registry.get("plan").is_some());
        assert!(registry.get("general-purpose").is_some());
    }

    #[test]
    fn resolve_spawnable_rejects_unknown_agent() {
        let registry = AgentRegistry::new();
        assert!(registry.resolve_spawnable("does-not-exist").is_err());
    }

    #[test]
    fn resolve_spawnable_rejects_non_spawnable_agent() {
        let mut registry = AgentRegistry::new();
        let mut root = AgentDefinition::builtin("root", "d", "p", ToolAccess::All);
        root.spawnable = false;
        registry.register(root);
        assert!(registry.resolve_spawnable("root").is_err());
        assert!(registry.resolve_spawnable("explore").is_ok());
    }
}
