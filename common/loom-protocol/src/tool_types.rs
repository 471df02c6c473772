use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Whether a tool may run concurrently with other tool calls in the same
/// step. Mirrors the Tool Executor's sequential-by-default policy: only
/// tools explicitly marked `Safe` (or judged safe for a specific input,
/// e.g. a read-only shell command) are eligible for concurrent dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencySafety {
    Safe,
    Unsafe,
}

/// Static descriptor for a tool, as exposed to the provider's function
/// calling surface and as recorded in the session's tool registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}
