//! Wire and in-memory data model shared by every component of the
//! agentic processing loop: sessions, messages, parts, tool descriptors,
//! permissions, and MCP server records.
//!
//! Types here are deliberately free of behavior — they are serialized to
//! storage and to the event bus as-is. Components that *act* on this data
//! (the processor, the tool executor, the compactor) live in their own
//! crates and depend on this one.

mod content;
mod loop_event;
mod mcp;
mod part;
mod permission;
mod session;
mod tool_types;
mod usage;

pub use content::ContentBlock;
pub use content::ImageDetail;
pub use content::ImageSource;
pub use loop_event::LoopEvent;
pub use mcp::McpServerConfig;
pub use mcp::McpTransport;
pub use part::CompactionReason;
pub use part::Part;
pub use part::ToolState;
pub use permission::ApprovalRequest;
pub use permission::CategoryPermissions;
pub use permission::CategoryPolicy;
pub use permission::PermissionMode;
pub use permission::PermissionResult;
pub use permission::PermissionRuleSpec;
pub use permission::RiskSeverity;
pub use permission::RiskType;
pub use permission::SecurityRisk;
pub use session::AgentProfile;
pub use session::FileDiffSummary;
pub use session::Message;
pub use session::MessageError;
pub use session::Role;
pub use session::Session;
pub use session::SessionRevert;
pub use session::SessionSummary;
pub use tool_types::ConcurrencySafety;
pub use tool_types::ToolDefinition;
pub use usage::FinishReason;
pub use usage::TokenUsage;
