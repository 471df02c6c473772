use crate::error::ToolNotFoundSnafu;
use crate::permission_rules::PermissionRuleEvaluator;
use crate::registry::ToolRegistry;
use loom_protocol::ApprovalRequest;
use loom_protocol::CategoryPolicy;
use loom_protocol::Part;
use loom_protocol::PermissionMode;
use loom_protocol::PermissionResult;
use loom_protocol::ToolState;
use loom_tools_api::PermissionDecision;
use loom_tools_api::Tool;
use loom_tools_api::ToolContext;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::warn;

/// Outcome of one `ToolExecutor::run` call, already shaped as the
/// `Part::Tool` the Processor appends to the session's message history.
#[derive(Debug, Clone)]
pub struct ExecutedToolCall {
    pub part: Part,
}

const DOOM_LOOP_THRESHOLD: usize = 3;
const DOOM_LOOP_WINDOW: usize = 8;

/// Dispatches tool calls through the five-stage [`loom_tools_api::Tool`]
/// pipeline, wrapped with the policy that isn't any one tool's concern:
/// registry lookup, category/rule/per-tool permission resolution (blocking
/// on the Permission Gate when any of them defer to `ask`), and the
/// doom-loop guard that stops a model from repeating an identical call
/// forever. `run` never returns `Err`: every failure — unknown tool,
/// denied permission, a rejected approval — is represented as an `Error`
/// state `Part::Tool` so the caller always has something to append to
/// history.
pub struct ToolExecutor {
    registry: ToolRegistry,
    rule_evaluator: PermissionRuleEvaluator,
    recent_calls: Mutex<VecDeque<(String, Value)>>,
    pending_mode_override: Option<PermissionMode>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        ToolExecutor {
            registry,
            rule_evaluator: PermissionRuleEvaluator::default(),
            recent_calls: Mutex::new(VecDeque::with_capacity(DOOM_LOOP_WINDOW)),
            pending_mode_override: None,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Force every permission check to resolve as if the session were in
    /// `mode`, bypassing `ctx.permission_mode` — used by subagent profiles
    /// that run tools non-interactively (e.g. the `explore` profile).
    pub fn with_mode_override(mut self, mode: PermissionMode) -> Self {
        self.pending_mode_override = Some(mode);
        self
    }

    /// Configures the agent's allow/deny/ask pattern rules, consulted
    /// before a tool's own `check_permission` whenever the category
    /// policy for that tool defers with `Ask`.
    pub fn with_rule_evaluator(mut self, evaluator: PermissionRuleEvaluator) -> Self {
        self.rule_evaluator = evaluator;
        self
    }

    fn count_recent_matches(&self, name: &str, input: &Value) -> usize {
        let recent = self.recent_calls.lock().unwrap_or_else(|e| e.into_inner());
        recent
            .iter()
            .filter(|(n, i)| n == name && i == input)
            .count()
    }

    fn remember_call(&self, name: &str, input: &Value) {
        let mut recent = self.recent_calls.lock().unwrap_or_else(|e| e.into_inner());
        recent.push_back((name.to_string(), input.clone()));
        if recent.len() > DOOM_LOOP_WINDOW {
            recent.pop_front();
        }
    }

    /// Runs the full pipeline for one call: lookup, validate, doom-loop
    /// guard, permission resolution, execute, post-process, cleanup.
    /// `call_id` and `name` become the `Part::Tool` identity; `input` is
    /// the raw provider-supplied arguments.
    pub async fn run(
        &self,
        call_id: &str,
        name: &str,
        input: Value,
        ctx: &mut ToolContext,
    ) -> ExecutedToolCall {
        let tool = match self.registry.get(name) {
            Some(tool) => tool,
            None => {
                let message = ToolNotFoundSnafu { name }.build().to_string();
                return ExecutedToolCall {
                    part: error_part(call_id, name, input, message),
                };
            }
        };

        if let Err(err) = tool.validate(&input) {
            return ExecutedToolCall {
                part: error_part(call_id, name, input, err.to_string()),
            };
        }

        // The doom-loop guard runs on every invocation past the threshold,
        // independent of `PermissionMode` — it's a runaway-call safety net,
        // not a permission-mode concern, so even `BypassPermissions` still
        // consults it.
        let repeat_count = self.count_recent_matches(name, &input);
        if repeat_count >= DOOM_LOOP_THRESHOLD {
            warn!(tool = name, repeat_count, "doom loop guard triggered");
            match ctx.category_permissions.doom_loop {
                CategoryPolicy::Allow => {}
                CategoryPolicy::Deny => {
                    return ExecutedToolCall {
                        part: error_part(
                            call_id,
                            name,
                            input,
                            format!(
                                "doom loop detected: {name} called {repeat_count} times with identical input"
                            ),
                        ),
                    };
                }
                CategoryPolicy::Ask => {
                    let request = ApprovalRequest {
                        request_id: ulid::Ulid::new().to_string(),
                        tool_name: name.to_string(),
                        description: format!(
                            "{name} has been called {repeat_count} times with identical input"
                        ),
                        risks: Vec::new(),
                        allow_remember: false,
                    };
                    if let PermissionDecision::Denied = ctx.ask_permission(request).await {
                        return ExecutedToolCall {
                            part: error_part(
                                call_id,
                                name,
                                input,
                                format!("doom loop detected: repeated {name} call rejected by permission gate"),
                            ),
                        };
                    }
                }
            }
        }

        let mode = self.pending_mode_override.unwrap_or(ctx.permission_mode);
        let resolution = match mode {
            PermissionMode::BypassPermissions => PermissionResult::Allowed,
            PermissionMode::AcceptEdits if is_auto_approved_under_accept_edits(name) => {
                PermissionResult::Allowed
            }
            _ => match category_policy_for(ctx.category_permissions, name) {
                Some(CategoryPolicy::Allow) => PermissionResult::Allowed,
                Some(CategoryPolicy::Deny) => PermissionResult::Denied {
                    reason: format!("{name} category denied by permission policy"),
                },
                Some(CategoryPolicy::Ask) | None => {
                    self.resolve_via_rules_then_tool(name, &input, tool.as_ref(), ctx).await
                }
            },
        };

        match resolution {
            PermissionResult::Allowed => {}
            PermissionResult::Denied { reason } => {
                return ExecutedToolCall {
                    part: error_part(call_id, name, input, format!("permission denied: {reason}")),
                };
            }
            PermissionResult::NeedsApproval { request } => {
                if let PermissionDecision::Denied = ctx.ask_permission(request).await {
                    return ExecutedToolCall {
                        part: error_part(
                            call_id,
                            name,
                            input,
                            "tool call rejected by permission gate".to_string(),
                        ),
                    };
                }
            }
        }

        self.remember_call(name, &input);
        let outcome = tool.execute(input.clone(), ctx).await;
        tool.cleanup(ctx).await;

        let part = match outcome {
            Ok(output) => {
                let output = tool.post_process(output);
                Part::Tool {
                    call_id: call_id.to_string(),
                    name: name.to_string(),
                    input,
                    state: if output.is_error {
                        ToolState::Error
                    } else {
                        ToolState::Completed
                    },
                    output: Some(output.content),
                    diff: output.diff,
                    error: None,
                }
            }
            Err(err) => error_part(call_id, name, input, err.to_string()),
        };

        ExecutedToolCall { part }
    }

    /// Consults the configured allow/deny/ask rules first, then falls back
    /// to the tool's own `check_permission` when no rule matches.
    async fn resolve_via_rules_then_tool(
        &self,
        name: &str,
        input: &Value,
        tool: &dyn Tool,
        ctx: &ToolContext,
    ) -> PermissionResult {
        let subject = render_subject(name, input);
        if let Some(result) = self.rule_evaluator.evaluate_as_permission_result(name, &subject) {
            return result;
        }
        tool.check_permission(input, ctx).await
    }
}

/// `AcceptEdits` auto-approves file mutation but still routes everything
/// else (network access, process spawning outside the file system) through
/// the gate.
fn is_auto_approved_under_accept_edits(name: &str) -> bool {
    matches!(name, "Write" | "Edit")
}

/// Maps a tool name to the category its wholesale `allow`/`deny`/`ask`
/// policy lives under, if it has one. Tools outside `bash`/`write` (Read,
/// Glob, Grep, Task) have no pre-decided category and always fall through
/// to rule/tool-level resolution.
fn category_policy_for(permissions: loom_protocol::CategoryPermissions, name: &str) -> Option<CategoryPolicy> {
    match name {
        "Bash" => Some(permissions.bash),
        "Write" | "Edit" => Some(permissions.write),
        _ => None,
    }
}

/// Renders a tool call's input as the subject string configured
/// allow/deny/ask patterns are matched against.
fn render_subject(name: &str, input: &Value) -> String {
    match name {
        "Bash" => input
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        "Write" | "Edit" => input
            .get("file_path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => input.to_string(),
    }
}

fn error_part(call_id: &str, name: &str, input: Value, message: String) -> Part {
    Part::Tool {
        call_id: call_id.to_string(),
        name: name.to_string(),
        input,
        state: ToolState::Error,
        output: None,
        diff: None,
        error: Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use loom_tools_api::ToolOutput;
    use std::path::PathBuf;
    use ulid::Ulid;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "Echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn input_schema(&self) -> Value {
            serde_json::json!({})
        }
        async fn execute(
            &self,
            input: Value,
            _ctx: &mut ToolContext,
        ) -> std::result::Result<ToolOutput, loom_tools_api::ToolError> {
            Ok(ToolOutput::text(input.to_string()))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(Ulid::new(), "call-1", PathBuf::from("/work"))
            .with_progress_sender(tokio::sync::mpsc::channel(1).0)
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let executor = ToolExecutor::new(ToolRegistry::new());
        let mut c = ctx();
        let executed = executor
            .run("call-1", "DoesNotExist", serde_json::json!({}), &mut c)
            .await;
        match executed.part {
            Part::Tool { state, error, .. } => {
                assert_eq!(state, ToolState::Error);
                assert_eq!(error.as_deref(), Some("Tool not found: DoesNotExist"));
            }
            other => panic!("expected Part::Tool, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn doom_loop_guard_trips_after_three_identical_completed_calls() {
        let mut registry = ToolRegistry::new();
        registry.register(std::sync::Arc::new(EchoTool));
        let executor =
            ToolExecutor::new(registry).with_mode_override(PermissionMode::BypassPermissions);
        let mut c = ctx();
        let input = serde_json::json!({"x": 1});

        for _ in 0..3 {
            let executed = executor.run("call-1", "Echo", input.clone(), &mut c).await;
            assert_eq!(
                matches!(executed.part, Part::Tool { state: ToolState::Completed, .. }),
                true
            );
        }
        let fourth = executor.run("call-1", "Echo", input.clone(), &mut c).await;
        match fourth.part {
            Part::Tool { state, error, .. } => {
                assert_eq!(state, ToolState::Error);
                assert!(error.unwrap().contains("doom loop"));
            }
            other => panic!("expected Part::Tool, got {other:?}"),
        }
    }
}
