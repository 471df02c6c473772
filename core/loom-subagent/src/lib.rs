//! Domain model for the Task Dispatcher: which named agent profiles exist,
//! what tools each may call, and how to seed a child session for one.
//!
//! This crate deliberately has no dependency on `loom-tools-api` or
//! `loom-loop`: it owns *which agent* and *what it may do*, not *how to run
//! a turn*. The dispatcher that actually implements
//! `loom_tools_api::SubagentSpawner` by recursing into the processing loop
//! lives in `loom-loop`, composed from the types here.

mod definition;
mod error;
mod registry;
mod session;
mod tool_filter;

pub use definition::AgentDefinition;
pub use definition::ToolAccess;
pub use error::Result;
pub use error::SubagentError;
pub use registry::AgentRegistry;
pub use session::ChildSessionSeed;
pub use session::MAX_SPAWN_DEPTH;
pub use session::seed_child_session;
pub use tool_filter::ALWAYS_BLOCKED_TOOLS;
pub use tool_filter::ToolFilter;
