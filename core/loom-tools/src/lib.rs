//! Built-in tools (Bash, Read, Write, Edit, Glob, Grep, Task) plus the
//! Tool Registry and Tool Executor that dispatch calls into them.

pub mod builtin;
mod error;
mod executor;
mod permission_rules;
mod registry;
mod sensitive_files;

pub use error::ExecutorError;
pub use executor::ExecutedToolCall;
pub use executor::ToolExecutor;
pub use permission_rules::PermissionRule;
pub use permission_rules::PermissionRuleEvaluator;
pub use registry::ToolRegistry;

// Re-exported so downstream crates only need to depend on `loom-tools`
// for the whole tool-calling surface.
pub use loom_tools_api::ContextModifier;
pub use loom_tools_api::FileReadState;
pub use loom_tools_api::PermissionDecision;
pub use loom_tools_api::PermissionGate;
pub use loom_tools_api::SpawnAgentInput;
pub use loom_tools_api::SpawnAgentResult;
pub use loom_tools_api::SubagentSpawner;
pub use loom_tools_api::Tool;
pub use loom_tools_api::ToolContext;
pub use loom_tools_api::ToolError;
pub use loom_tools_api::ToolOutput;

/// Shorthand used throughout the built-in tool implementations; matches
/// the return type `Tool`'s methods are declared with in `loom-tools-api`.
pub(crate) type ToolResult<T> = std::result::Result<T, ToolError>;

