//! The `Tool` trait and the context/output types every tool (built-in or
//! MCP-exposed) is implemented against. Kept separate from `loom-tools`
//! so that the MCP bridge can expose remote tools through the same
//! trait without depending on the built-in tool implementations.

mod context;
mod error;
mod gate;
mod output;
mod spawner;
mod tool;

pub use context::FileReadState;
pub use context::ToolContext;
pub use error::ToolError;
pub use error::tool_error;
pub use gate::PermissionDecision;
pub use gate::PermissionGate;
pub use output::ContextModifier;
pub use output::ToolOutput;
pub use spawner::SpawnAgentInput;
pub use spawner::SpawnAgentResult;
pub use spawner::SubagentSpawner;
pub use tool::Tool;
