use loom_protocol::ApprovalRequest;
use loom_protocol::CategoryPolicy;
use loom_protocol::PermissionResult;

/// One entry of a user's configured allow/deny/ask list, e.g.
/// `Bash(git status:*)` or `Write(/etc/**)`. `pattern` is matched against
/// the tool's own rendering of its input (a command line for Bash, a
/// glob-matchable path for Write/Edit) rather than the raw JSON, since
/// that's what users write in their settings files.
#[derive(Debug, Clone)]
pub struct PermissionRule {
    pub tool_name: String,
    pub pattern: String,
    pub action: CategoryPolicy,
}

impl PermissionRule {
    pub fn new(
        tool_name: impl Into<String>,
        pattern: impl Into<String>,
        action: CategoryPolicy,
    ) -> Self {
        PermissionRule {
            tool_name: tool_name.into(),
            pattern: pattern.into(),
            action,
        }
    }

    fn matches(&self, tool_name: &str, subject: &str) -> bool {
        if self.tool_name != tool_name {
            return false;
        }
        match self.pattern.strip_suffix('*') {
            Some(prefix) => subject.starts_with(prefix),
            None => self.pattern == subject,
        }
    }
}

/// Evaluates a tool call's rendered subject against an ordered list of
/// [`PermissionRule`]s. First match wins; no match defers to the caller's
/// own permission-mode default.
#[derive(Debug, Clone, Default)]
pub struct PermissionRuleEvaluator {
    rules: Vec<PermissionRule>,
}

impl PermissionRuleEvaluator {
    pub fn new(rules: Vec<PermissionRule>) -> Self {
        PermissionRuleEvaluator { rules }
    }

    pub fn evaluate(&self, tool_name: &str, subject: &str) -> Option<CategoryPolicy> {
        self.rules
            .iter()
            .find(|rule| rule.matches(tool_name, subject))
            .map(|rule| rule.action)
    }

    pub fn evaluate_as_permission_result(
        &self,
        tool_name: &str,
        subject: &str,
    ) -> Option<PermissionResult> {
        self.evaluate(tool_name, subject).map(|action| match action {
            CategoryPolicy::Allow => PermissionResult::Allowed,
            CategoryPolicy::Deny => PermissionResult::Denied {
                reason: format!("denied by configured rule for {tool_name}"),
            },
            CategoryPolicy::Ask => PermissionResult::NeedsApproval {
                request: ApprovalRequest {
                    request_id: ulid::Ulid::new().to_string(),
                    tool_name: tool_name.to_string(),
                    description: format!("matches configured ask rule for {tool_name}"),
                    risks: Vec::new(),
                    allow_remember: true,
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins() {
        let evaluator = PermissionRuleEvaluator::new(vec![PermissionRule::new(
            "Bash",
            "git status",
            CategoryPolicy::Allow,
        )]);
        assert_eq!(
            evaluator.evaluate("Bash", "git status"),
            Some(CategoryPolicy::Allow)
        );
    }

    #[test]
    fn prefix_wildcard_matches() {
        let evaluator = PermissionRuleEvaluator::new(vec![PermissionRule::new(
            "Bash",
            "git *",
            CategoryPolicy::Allow,
        )]);
        assert_eq!(
            evaluator.evaluate("Bash", "git push origin main"),
            Some(CategoryPolicy::Allow)
        );
    }

    #[test]
    fn no_match_returns_none() {
        let evaluator = PermissionRuleEvaluator::new(vec![PermissionRule::new(
            "Bash",
            "git *",
            CategoryPolicy::Allow,
        )]);
        assert_eq!(evaluator.evaluate("Bash", "rm -rf /"), None);
    }

    #[test]
    fn tool_name_must_also_match() {
        let evaluator = PermissionRuleEvaluator::new(vec![PermissionRule::new(
            "Write",
            "*",
            CategoryPolicy::Deny,
        )]);
        assert_eq!(evaluator.evaluate("Bash", "ls"), None);
    }
}
