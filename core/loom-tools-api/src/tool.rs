use crate::ToolContext;
use crate::ToolOutput;
use crate::error::Result;
use async_trait::async_trait;
use loom_protocol::ConcurrencySafety;
use loom_protocol::PermissionResult;
use serde_json::Value;

/// A tool the Processor/Loop may call on the model's behalf.
///
/// The Tool Executor runs every call through the same five stages:
/// `validate` the raw input against the schema, `check_permission`
/// against the Permission Gate, `execute`, `post_process` the successful
/// output, then `cleanup` unconditionally. Only `execute` is required;
/// the others have permissive defaults so a simple read-only tool can
/// implement just `name`/`description`/`input_schema`/`execute`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> Value;

    fn concurrency_safety(&self) -> ConcurrencySafety {
        ConcurrencySafety::Unsafe
    }

    /// Whether this specific call's input is known to be safe for
    /// concurrent execution, independent of `concurrency_safety`'s
    /// per-tool default (e.g. a read-only shell command).
    fn is_concurrency_safe_for(&self, _input: &Value) -> bool {
        self.concurrency_safety() == ConcurrencySafety::Safe
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn max_result_size_chars(&self) -> i32 {
        30_000
    }

    /// Structural validation of the raw tool-call arguments, before
    /// permission checks or execution. Default accepts anything;
    /// `execute` is still responsible for extracting/validating its own
    /// fields since `serde_json::Value` carries no schema guarantee.
    fn validate(&self, _input: &Value) -> Result<()> {
        Ok(())
    }

    async fn check_permission(&self, _input: &Value, _ctx: &ToolContext) -> PermissionResult {
        PermissionResult::Allowed
    }

    async fn execute(&self, input: Value, ctx: &mut ToolContext) -> Result<ToolOutput>;

    /// Hook for truncating or otherwise transforming a successful
    /// output before it's recorded on the `Part::Tool`. Default applies
    /// `max_result_size_chars`.
    fn post_process(&self, mut output: ToolOutput) -> ToolOutput {
        let limit = self.max_result_size_chars() as usize;
        if output.content.chars().count() > limit {
            let truncated: String = output.content.chars().take(limit).collect();
            output.content = format!("{truncated}\n\n... (truncated at {limit} characters)");
        }
        output
    }

    /// Called after execution regardless of outcome, for tools that hold
    /// a resource across the call (a spawned background process, an
    /// open file handle). Default is a no-op.
    async fn cleanup(&self, _ctx: &mut ToolContext) {}
}
