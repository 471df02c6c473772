use serde::Deserialize;
use serde::Serialize;

/// Session-wide permission posture. `Plan` additionally restricts Write
/// and Edit to a single designated plan file (see the Task Dispatcher's
/// `explore`/`plan` subagent profiles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Every tool call is passed to the Permission Gate.
    Default,
    /// Bash/Write/Edit calls are auto-approved without prompting.
    AcceptEdits,
    /// No tool call ever prompts; denials are the caller's responsibility.
    BypassPermissions,
    Plan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    Network,
    Elevated,
    Destructive,
    SensitiveFile,
    SystemConfig,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRisk {
    pub risk_type: RiskType,
    pub severity: RiskSeverity,
    pub message: String,
}

/// A request handed to whatever surface answers on behalf of the user
/// (CLI prompt, IDE dialog, an auto-approving test harness).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: String,
    pub tool_name: String,
    pub description: String,
    pub risks: Vec<SecurityRisk>,
    pub allow_remember: bool,
}

/// Outcome of the Permission Gate's `check` call for one tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PermissionResult {
    Allowed,
    Denied { reason: String },
    NeedsApproval { request: ApprovalRequest },
}

/// Tri-state policy for one permission category. `Ask` defers to the
/// per-call risk analysis (a configured rule, a tool's own
/// `check_permission`, or the doom-loop guard) rather than pre-deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryPolicy {
    Allow,
    Deny,
    Ask,
}

/// Per-category permission policy, orthogonal to [`PermissionMode`]'s
/// session-wide posture: `bash`/`write` gate the matching built-in tools
/// wholesale before their own risk analysis runs, and `doom_loop` decides
/// whether a repeated identical call is let through, rejected outright, or
/// sent to the Permission Gate on every invocation past the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPermissions {
    pub bash: CategoryPolicy,
    pub write: CategoryPolicy,
    pub doom_loop: CategoryPolicy,
}

impl Default for CategoryPermissions {
    fn default() -> Self {
        CategoryPermissions {
            bash: CategoryPolicy::Ask,
            write: CategoryPolicy::Ask,
            doom_loop: CategoryPolicy::Ask,
        }
    }
}

/// One entry of a user's configured allow/deny list, e.g.
/// `Bash(git status:*)` or `Write(/etc/**)`. Matched against a tool's own
/// rendering of its input (a command line for Bash, a path for
/// Write/Edit) by `loom_tools::PermissionRuleEvaluator`; kept as plain
/// data here so [`AgentProfile`](crate::AgentProfile) can carry it without
/// `loom-protocol` depending on `loom-tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRuleSpec {
    pub tool_name: String,
    pub pattern: String,
    pub action: CategoryPolicy,
}
