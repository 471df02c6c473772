use crate::processor::Processor;
use async_trait::async_trait;
use loom_protocol::Session;
use loom_subagent::AgentRegistry;
use loom_subagent::MAX_SPAWN_DEPTH;
use loom_subagent::seed_child_session;
use loom_tools_api::SpawnAgentInput;
use loom_tools_api::SpawnAgentResult;
use loom_tools_api::SubagentSpawner;
use loom_tools_api::ToolError;
use loom_tools_api::tool_error::ExecutionFailedSnafu;
use snafu::ensure;
use std::sync::Arc;

/// Implements `SubagentSpawner` by seeding a child session and recursing
/// into the processing loop. One instance is built per pending Task call
/// inside `Processor::run_pending_tools`, carrying the depth of the
/// session it was built for so it can refuse to spawn past
/// `loom_subagent::MAX_SPAWN_DEPTH` regardless of which agent is named.
pub struct TaskDispatcher {
    processor: Arc<Processor>,
    agent_registry: Arc<AgentRegistry>,
    session: Session,
    depth: u32,
}

impl TaskDispatcher {
    pub fn new(processor: Arc<Processor>, agent_registry: Arc<AgentRegistry>, session: Session, depth: u32) -> Self {
        TaskDispatcher {
            processor,
            agent_registry,
            session,
            depth,
        }
    }
}

#[async_trait]
impl SubagentSpawner for TaskDispatcher {
    async fn spawn(&self, input: SpawnAgentInput) -> Result<SpawnAgentResult, ToolError> {
        ensure!(
            self.depth < MAX_SPAWN_DEPTH,
            ExecutionFailedSnafu {
                message: format!("maximum subagent spawn depth ({MAX_SPAWN_DEPTH}) exceeded"),
            }
        );

        let definition = self
            .agent_registry
            .resolve_spawnable(&input.agent_type)
            .map_err(|e| ExecutionFailedSnafu { message: e.to_string() }.build())?;

        let seed = seed_child_session(&self.session, input.prompt);
        self.processor
            .storage()
            .save_session(&seed.session)
            .await
            .map_err(|e| ExecutionFailedSnafu { message: e.to_string() }.build())?;
        self.processor
            .storage()
            .append_message(&seed.seed_message)
            .await
            .map_err(|e| ExecutionFailedSnafu { message: e.to_string() }.build())?;

        let mut profile = definition.profile.clone();
        if let Some(model) = input.model {
            profile.model = Some(model);
        }

        let child_session_id = seed.session.id;
        let output = self
            .processor
            .process_subagent(child_session_id, profile, self.depth + 1)
            .await
            .map_err(|e| ExecutionFailedSnafu { message: e.to_string() }.build())?;

        Ok(SpawnAgentResult {
            agent_session_id: child_session_id,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::EventBus;
    use crate::traits::Provider;
    use crate::traits::Storage;
    use async_trait::async_trait;
    use futures::stream;
    use loom_protocol::FinishReason;
    use loom_protocol::LoopEvent;
    use loom_protocol::Message;
    use loom_subagent::AgentDefinition;
    use loom_subagent::ToolAccess;
    use loom_tools::ToolRegistry;
    use std::sync::Mutex;
    use ulid::Ulid;

    struct StubProvider {
        reply: &'static str,
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn create_completion(
            &self,
            _request: crate::traits::CompletionRequest,
        ) -> loom_error::Result<stream::BoxStream<'static, loom_error::Result<crate::traits::StreamChunk>>>
        {
            let chunk = crate::traits::StreamChunk {
                content: Some(self.reply.to_string()),
                finish_reason: Some(FinishReason::Stop),
                ..Default::default()
            };
            Ok(Box::pin(stream::iter(vec![Ok(chunk)])))
        }
    }

    #[derive(Default)]
    struct StubStorage {
        session: Mutex<Option<Session>>,
        messages: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl Storage for StubStorage {
        async fn load_session(&self, _id: Ulid) -> loom_error::Result<Option<Session>> {
            Ok(self.session.lock().unwrap_or_else(|e| e.into_inner()).clone())
        }
        async fn save_session(&self, session: &Session) -> loom_error::Result<()> {
            *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
            Ok(())
        }
        async fn load_messages(&self, _session_id: Ulid) -> loom_error::Result<Vec<Message>> {
            Ok(self.messages.lock().unwrap_or_else(|e| e.into_inner()).clone())
        }
        async fn append_message(&self, message: &Message) -> loom_error::Result<()> {
            self.messages.lock().unwrap_or_else(|e| e.into_inner()).push(message.clone());
            Ok(())
        }
        async fn update_message(&self, message: &Message) -> loom_error::Result<()> {
            self.messages
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|m| m.id != message.id);
            self.messages.lock().unwrap_or_else(|e| e.into_inner()).push(message.clone());
            Ok(())
        }
    }

    struct NullBus;
    impl EventBus for NullBus {
        fn publish(&self, _event: LoopEvent) {}
    }

    fn build_dispatcher(depth: u32, agent_registry: AgentRegistry) -> TaskDispatcher {
        let processor = Processor::new(
            Arc::new(StubStorage::default()),
            Arc::new(StubProvider { reply: "ok" }),
            Arc::new(NullBus),
            ToolRegistry::new(),
            Arc::new(AgentRegistry::new()),
            "gpt-test",
            "gpt-test-compact",
        );
        let session = Session::new("/work");
        TaskDispatcher::new(processor, Arc::new(agent_registry), session, depth)
    }

    fn input(agent_type: &str) -> SpawnAgentInput {
        SpawnAgentInput {
            agent_type: agent_type.to_string(),
            prompt: "investigate the bug".to_string(),
            model: None,
            max_turns: None,
        }
    }

    #[tokio::test]
    async fn refuses_to_spawn_past_max_depth() {
        let dispatcher = build_dispatcher(MAX_SPAWN_DEPTH, AgentRegistry::new());
        let result = dispatcher.spawn(input("general-purpose")).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }

    #[tokio::test]
    async fn unknown_agent_type_surfaces_as_execution_failed() {
        let dispatcher = build_dispatcher(0, AgentRegistry::new());
        let result = dispatcher.spawn(input("does-not-exist")).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }

    #[tokio::test]
    async fn non_spawnable_agent_is_rejected_even_within_depth() {
        let mut registry = AgentRegistry::new();
        let mut root = AgentDefinition::builtin("root", "interactive root", "p", ToolAccess::All);
        root.spawnable = false;
        registry.register(root);

        let dispatcher = build_dispatcher(0, registry);
        let result = dispatcher.spawn(input("root")).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }

    #[tokio::test]
    async fn spawns_general_purpose_agent_and_returns_its_output() {
        let dispatcher = build_dispatcher(0, AgentRegistry::new());
        let result = dispatcher.spawn(input("general-purpose")).await.expect("spawn succeeds");
        assert_eq!(result.output, "ok");
    }
}
