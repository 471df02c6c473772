use crate::error::Result;
use async_trait::async_trait;
use ulid::Ulid;

/// Input the Task tool hands to whatever implements subagent spawning
/// (the Task Dispatcher, in `loom-subagent`). Kept here rather than in
/// `loom-subagent` so the Task tool can depend on the trait without
/// `loom-tools` depending on `loom-subagent` — the processor wires the
/// concrete dispatcher into each [`crate::ToolContext`] at session start.
#[derive(Debug, Clone)]
pub struct SpawnAgentInput {
    pub agent_type: String,
    pub prompt: String,
    pub model: Option<String>,
    pub max_turns: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct SpawnAgentResult {
    pub agent_session_id: Ulid,
    pub output: String,
}

#[async_trait]
pub trait SubagentSpawner: Send + Sync {
    async fn spawn(&self, input: SpawnAgentInput) -> Result<SpawnAgentResult>;
}
