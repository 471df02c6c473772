use crate::compactor::Compactor;
use crate::decoder::StreamDecoder;
use crate::error::AbortedSnafu;
use crate::error::LoopError;
use crate::error::MaxStepsSnafu;
use crate::error::NoUserMessageSnafu;
use crate::error::OutputLengthSnafu;
use crate::error::ProviderSnafu;
use crate::error::SessionNotFoundSnafu;
use crate::error::StorageSnafu;
use crate::gate::EventBusPermissionGate;
use crate::retry::RetryDecision;
use crate::retry::RetryPolicy;
use crate::traits::CompletionRequest;
use crate::traits::EventBus;
use crate::traits::Provider;
use crate::traits::ProviderMessage;
use crate::traits::Storage;
use futures::StreamExt;
use loom_context::ContextBudget;
use loom_context::ConversationContext;
use loom_context::EnvironmentInfo;
use loom_message::MessageHistory;
use loom_prompt::SystemPromptBuilder;
use loom_protocol::AgentProfile;
use loom_protocol::FileDiffSummary;
use loom_protocol::FinishReason;
use loom_protocol::LoopEvent;
use loom_protocol::Message;
use loom_protocol::MessageError;
use loom_protocol::Part;
use loom_protocol::Role;
use loom_protocol::Session;
use loom_subagent::AgentRegistry;
use loom_tools::PermissionDecision;
use loom_tools::PermissionRule;
use loom_tools::PermissionRuleEvaluator;
use loom_tools::ToolExecutor;
use loom_tools::ToolRegistry;
use loom_tools_api::ToolContext;
use snafu::OptionExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::info_span;
use tracing::warn;
use ulid::Ulid;

/// Internal cap on provider round-trips within one [`Processor::process`]
/// call. The specification fixes the retry policy's numeric parameters
/// exactly but leaves `maxSteps` itself a deployment knob; 50 is a
/// generous default that only bites a genuinely runaway tool-call loop.
const MAX_STEPS: u32 = 50;

const DEFAULT_TITLE: &str = "New session";
const TITLE_MAX_CHARS: usize = 100;

/// Drives the agentic loop for one session: one provider round-trip per
/// step, tool execution between steps, compaction when the running token
/// estimate crosses the budget, and the single-writer-per-session
/// concurrency guarantee the specification requires.
pub struct Processor {
    storage: Arc<dyn Storage>,
    provider: Arc<dyn Provider>,
    bus: Arc<dyn EventBus>,
    tool_registry: ToolRegistry,
    agent_registry: Arc<AgentRegistry>,
    compactor: Compactor,
    default_model: String,
    locks: StdMutex<HashMap<Ulid, Arc<AsyncMutex<()>>>>,
    cancellations: StdMutex<HashMap<Ulid, CancellationToken>>,
    active_messages: StdMutex<HashMap<Ulid, Message>>,
    permission_gate: Arc<EventBusPermissionGate>,
}

impl Processor {
    pub fn new(
        storage: Arc<dyn Storage>,
        provider: Arc<dyn Provider>,
        bus: Arc<dyn EventBus>,
        tool_registry: ToolRegistry,
        agent_registry: Arc<AgentRegistry>,
        default_model: impl Into<String>,
        compact_model: impl Into<String>,
    ) -> Arc<Self> {
        let permission_gate = Arc::new(EventBusPermissionGate::new(Arc::clone(&bus)));
        Arc::new(Processor {
            storage,
            provider,
            bus,
            tool_registry,
            agent_registry,
            compactor: Compactor::new(compact_model),
            default_model: default_model.into(),
            locks: StdMutex::new(HashMap::new()),
            cancellations: StdMutex::new(HashMap::new()),
            active_messages: StdMutex::new(HashMap::new()),
            permission_gate,
        })
    }

    pub fn agent_registry(&self) -> &Arc<AgentRegistry> {
        &self.agent_registry
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn session_lock(&self, session_id: Ulid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Non-blocking check of whether a run is currently in flight for
    /// `session_id`. Racy by nature (a run can start or finish right
    /// after this returns) — callers use it for UI state, not
    /// synchronization.
    pub fn is_processing(&self, session_id: Ulid) -> bool {
        self.session_lock(session_id).try_lock().is_err()
    }

    /// The in-progress assistant message for a session, if a run is
    /// currently writing one.
    pub fn active_state(&self, session_id: Ulid) -> Option<Message> {
        self.active_messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&session_id)
            .cloned()
    }

    /// Requests cancellation of the run currently in flight for
    /// `session_id`, if any. A no-op if no run is active.
    pub fn abort(&self, session_id: Ulid) {
        if let Some(token) = self
            .cancellations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&session_id)
        {
            token.cancel();
        }
    }

    /// Publishes a [`LoopEvent`] without ever blocking the run — the
    /// event bus contract the type's own documentation names this
    /// method to satisfy.
    pub fn publish(&self, event: LoopEvent) {
        self.bus.publish(event);
    }

    /// Delivers a decision for an outstanding `PermissionRequested` event,
    /// unblocking the tool call waiting on the Permission Gate.
    pub fn resolve_permission(&self, request_id: &str, decision: PermissionDecision) {
        self.permission_gate.resolve(request_id, decision);
    }

    /// Runs the loop for a top-level session turn.
    pub async fn process(self: &Arc<Self>, session_id: Ulid, agent: AgentProfile) -> Result<(), LoopError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        self.run(session_id, agent, false, 0).await
    }

    /// Runs the loop for a subagent turn and returns the final assistant
    /// text, for the Task Dispatcher. `depth` is this session's distance
    /// from the root in the spawn chain, tracked by the dispatcher rather
    /// than stored on `Session` itself (see `loom_subagent::MAX_SPAWN_DEPTH`).
    pub async fn process_subagent(
        self: &Arc<Self>,
        session_id: Ulid,
        agent: AgentProfile,
        depth: u32,
    ) -> Result<String, LoopError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        self.run(session_id, agent, true, depth).await?;
        let messages = self.storage.load_messages(session_id).await.map_err(storage_err)?;
        Ok(messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(render_message_text)
            .unwrap_or_default())
    }

    async fn run(
        self: &Arc<Self>,
        session_id: Ulid,
        agent: AgentProfile,
        is_subagent: bool,
        depth: u32,
    ) -> Result<(), LoopError> {
        let span = info_span!("process", session_id = %session_id, agent = %agent.name);
        self.run_inner(session_id, agent, is_subagent, depth).instrument(span).await
    }

    async fn run_inner(
        self: &Arc<Self>,
        session_id: Ulid,
        agent: AgentProfile,
        is_subagent: bool,
        depth: u32,
    ) -> Result<(), LoopError> {
        let token = CancellationToken::new();
        self.cancellations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id, token.clone());

        let result = self.run_steps(session_id, agent, is_subagent, depth, &token).await;

        self.cancellations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&session_id);
        self.active_messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&session_id);

        result
    }

    async fn run_steps(
        self: &Arc<Self>,
        session_id: Ulid,
        agent: AgentProfile,
        is_subagent: bool,
        depth: u32,
        token: &CancellationToken,
    ) -> Result<(), LoopError> {
        let mut session = self
            .storage
            .load_session(session_id)
            .await
            .map_err(storage_err)?
            .context(SessionNotFoundSnafu {
                session_id: session_id.to_string(),
            })?;

        let mut history = MessageHistory::new();
        for message in self.storage.load_messages(session_id).await.map_err(storage_err)? {
            history.push(message);
        }
        if !matches!(history.all().last().map(|m| m.role), Some(Role::User)) {
            return NoUserMessageSnafu {
                session_id: session_id.to_string(),
            }
            .fail();
        }

        let model = agent.model.clone().unwrap_or_else(|| self.default_model.clone());

        let mut message = Message::new(session_id, Role::Assistant, vec![Part::StepStart]);
        self.storage.append_message(&message).await.map_err(storage_err)?;
        history.push(message.clone());
        self.active_messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id, message.clone());
        self.bus.publish(LoopEvent::StepStarted {
            session_id,
            message_id: message.id,
        });

        if !is_subagent && session.parent_id.is_none() && is_default_title(&session.title) {
            self.spawn_title_generation(session.clone(), &history, &model);
        }

        let mut tool_names = if agent.tools.is_empty() {
            self.tool_registry.names()
        } else {
            agent.tools.clone()
        };
        if is_subagent {
            tool_names.retain(|name| !loom_subagent::ALWAYS_BLOCKED_TOOLS.contains(&name.as_str()));
        }
        let step_registry = if agent.tools.is_empty() {
            self.tool_registry.clone()
        } else {
            filtered_registry(&self.tool_registry, &tool_names)
        };
        let rules = agent
            .permission_rules
            .iter()
            .map(|spec| PermissionRule::new(spec.tool_name.clone(), spec.pattern.clone(), spec.action))
            .collect();
        let executor = Arc::new(
            ToolExecutor::new(step_registry)
                .with_mode_override(agent.permission_mode)
                .with_rule_evaluator(PermissionRuleEvaluator::new(rules)),
        );

        let mut retry_policy = RetryPolicy::new();

        for step_idx in 0..MAX_STEPS {
            if token.is_cancelled() {
                self.bus.publish(LoopEvent::Error {
                    session_id,
                    message: "aborted".to_string(),
                });
                self.persist_message_failure(&mut message, "aborted", "run cancelled").await;
                return AbortedSnafu {
                    reason: "cancelled".to_string(),
                }
                .fail();
            }

            let env = EnvironmentInfo::detect(PathBuf::from(session.cwd.clone()), model.clone())
                .map_err(|e| StorageSnafu { message: e.to_string() }.build())?;
            let budget = ContextBudget::new(env.context_window, env.max_output_tokens);

            let estimate = history.last_reported_usage();
            if self.compactor.should_compact(
                (estimate.input_tokens + estimate.output_tokens) as i64,
                budget.compact_token_threshold as i64,
            ) {
                self.compactor
                    .compact(
                        session_id,
                        &mut history,
                        self.provider.as_ref(),
                        self.storage.as_ref(),
                        self.bus.as_ref(),
                        loom_protocol::CompactionReason::TokenThreshold,
                        false,
                    )
                    .await?;
            }

            if step_idx > 0 {
                message.parts.push(Part::StepStart);
            }

            let mut conv_ctx_builder = ConversationContext::builder()
                .environment(env)
                .budget(budget)
                .tool_names(tool_names.clone())
                .permission_mode(agent.permission_mode);
            if is_subagent {
                conv_ctx_builder = conv_ctx_builder.subagent_type(agent.name.clone());
            }
            let conv_ctx = conv_ctx_builder
                .build()
                .map_err(|e| StorageSnafu { message: e.to_string() }.build())?;

            let system_prompt = if is_subagent {
                SystemPromptBuilder::build_for_subagent(&conv_ctx, &agent.name)
            } else {
                SystemPromptBuilder::build(&conv_ctx)
            };

            let tools = if tool_names.is_empty() {
                Vec::new()
            } else {
                executor
                    .registry()
                    .definitions()
                    .into_iter()
                    .filter(|d| tool_names.iter().any(|n| n == &d.name))
                    .collect()
            };

            let request = CompletionRequest {
                model: model.clone(),
                system_prompt,
                messages: history.visible_messages().iter().map(to_provider_message).collect(),
                tools,
                max_output_tokens: budget.max_output_tokens,
                temperature: 1.0,
                top_p: 1.0,
            };

            let (finish_reason, usage) = match self
                .run_one_stream(&request, &mut message, session_id, &mut retry_policy, token)
                .await
            {
                StepOutcome::Terminal(result) => return result,
                StepOutcome::FinishReason(reason, usage) => (reason, usage),
            };

            message.parts.push(Part::StepFinish { finish_reason, usage });
            retry_policy.reset();
            self.storage.update_message(&message).await.map_err(storage_err)?;
            if let Some(existing) = history.get_mut(message.id) {
                *existing = message.clone();
            }
            self.active_messages
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(session_id, message.clone());

            match finish_reason {
                FinishReason::Stop | FinishReason::ContentFilter | FinishReason::Other => {
                    self.bus.publish(LoopEvent::StepFinished {
                        session_id,
                        message_id: message.id,
                    });
                    return Ok(());
                }
                FinishReason::ToolCalls => {
                    self.run_pending_tools(
                        &mut message,
                        &executor,
                        session_id,
                        &mut session,
                        &agent,
                        depth,
                        token,
                    )
                    .await;
                    self.storage.update_message(&message).await.map_err(storage_err)?;
                    if let Some(existing) = history.get_mut(message.id) {
                        *existing = message.clone();
                    }
                }
                FinishReason::Length => {
                    self.bus.publish(LoopEvent::Error {
                        session_id,
                        message: "max_tokens".to_string(),
                    });
                    self.persist_message_failure(
                        &mut message,
                        "max_tokens",
                        "provider output truncated at max tokens",
                    )
                    .await;
                    return OutputLengthSnafu {
                        message: "provider output truncated at max tokens".to_string(),
                    }
                    .fail();
                }
            }
        }

        self.bus.publish(LoopEvent::Error {
            session_id,
            message: "max_steps".to_string(),
        });
        self.persist_message_failure(
            &mut message,
            "max_steps",
            format!("exceeded the {MAX_STEPS}-step limit"),
        )
        .await;
        MaxStepsSnafu { limit: MAX_STEPS }.fail()
    }

    async fn run_one_stream(
        self: &Arc<Self>,
        request: &CompletionRequest,
        message: &mut Message,
        session_id: Ulid,
        retry_policy: &mut RetryPolicy,
        token: &CancellationToken,
    ) -> StepOutcome {
        loop {
            let mut stream = match self.provider.create_completion(request.clone()).await {
                Ok(stream) => stream,
                Err(err) => match self.handle_provider_failure(session_id, err.to_string(), retry_policy).await {
                    StepOutcome::Terminal(result) => return StepOutcome::Terminal(result),
                    StepOutcome::FinishReason(..) => continue,
                },
            };

            let mut decoder = StreamDecoder::new();
            let mut reported_finish: Option<FinishReason> = None;
            let mut stream_failed = false;
            let mut failure_message = String::new();

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        self.bus.publish(LoopEvent::Error { session_id, message: "aborted".to_string() });
                        self.persist_message_failure(message, "aborted", "run cancelled mid-stream").await;
                        return StepOutcome::Terminal(AbortedSnafu {
                            reason: "cancelled mid-stream".to_string(),
                        }.fail());
                    }
                    chunk = stream.next() => {
                        match chunk {
                            None => break,
                            Some(Ok(chunk)) => {
                                if chunk.finish_reason.is_some() {
                                    reported_finish = chunk.finish_reason;
                                }
                                decoder.apply_chunk(message, &chunk, self.bus.as_ref(), session_id);
                            }
                            Some(Err(err)) => {
                                stream_failed = true;
                                failure_message = err.to_string();
                                break;
                            }
                        }
                    }
                }
            }

            if stream_failed {
                match self.handle_provider_failure(session_id, failure_message, retry_policy).await {
                    StepOutcome::Terminal(result) => return StepOutcome::Terminal(result),
                    StepOutcome::FinishReason(..) => continue,
                }
            }

            let finish_reason = decoder.finish(message, reported_finish);
            return StepOutcome::FinishReason(finish_reason, decoder.usage());
        }
    }

    async fn handle_provider_failure(
        &self,
        session_id: Ulid,
        message: String,
        retry_policy: &mut RetryPolicy,
    ) -> StepOutcome {
        let mut rng = rand::rng();
        match retry_policy.next_decision(&mut rng) {
            RetryDecision::Stop => {
                self.bus.publish(LoopEvent::Error {
                    session_id,
                    message: message.clone(),
                });
                StepOutcome::Terminal(ProviderSnafu { message }.fail())
            }
            RetryDecision::Retry(delay) => {
                tokio::time::sleep(delay).await;
                StepOutcome::FinishReason(FinishReason::Other, loom_protocol::TokenUsage::default())
            }
        }
    }

    /// Persists a user-visible failure marker on the in-progress assistant
    /// message before returning a terminal `Err` from the loop, so a
    /// dropped `LoopEvent::Error` (no subscriber connected, client
    /// reconnects later) doesn't leave the session's history silent about
    /// why the turn ended early.
    async fn persist_message_failure(&self, message: &mut Message, kind: &str, text: impl Into<String>) {
        message.error = Some(MessageError {
            kind: kind.to_string(),
            message: text.into(),
        });
        if let Err(err) = self.storage.update_message(message).await {
            warn!(error = %err, "failed to persist message failure marker");
        }
    }

    async fn run_pending_tools(
        self: &Arc<Self>,
        message: &mut Message,
        executor: &Arc<ToolExecutor>,
        session_id: Ulid,
        session: &mut Session,
        agent: &AgentProfile,
        depth: u32,
        token: &CancellationToken,
    ) {
        let mut diffs: Vec<FileDiffSummary> = Vec::new();
        let pending: Vec<(usize, String, String, serde_json::Value)> = message
            .parts
            .iter()
            .enumerate()
            .filter_map(|(idx, part)| match part {
                Part::Tool {
                    call_id,
                    name,
                    input,
                    state: loom_protocol::ToolState::Running,
                    ..
                } => Some((idx, call_id.clone(), name.clone(), input.clone())),
                _ => None,
            })
            .collect();

        for (idx, call_id, name, input) in pending {
            let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel(16);
            let bus = Arc::clone(&self.bus);
            let forward_session_id = session_id;
            let forward_call_id = call_id.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(message) = progress_rx.recv().await {
                    bus.publish(LoopEvent::ToolProgress {
                        session_id: forward_session_id,
                        call_id: forward_call_id.clone(),
                        message,
                    });
                }
            });

            let mut ctx = ToolContext::new(session_id, call_id.clone(), PathBuf::from(session.cwd.clone()))
                .with_progress_sender(progress_tx)
                .with_permission_gate(Arc::clone(&self.permission_gate) as Arc<dyn loom_tools_api::PermissionGate>);
            ctx.permission_mode = agent.permission_mode;
            ctx.category_permissions = agent.category_permissions;
            if executor.registry().get("Task").is_some() {
                let dispatcher = crate::dispatcher::TaskDispatcher::new(
                    Arc::clone(self),
                    Arc::clone(self.agent_registry()),
                    session.clone(),
                    depth,
                );
                ctx = ctx.with_subagent_spawner(Arc::new(dispatcher));
            }

            let part = executor.run(&call_id, &name, input.clone(), &mut ctx).await.part;
            drop(ctx);
            let _ = forwarder.await;

            if let Part::Tool {
                name,
                input,
                state: loom_protocol::ToolState::Completed,
                diff: Some(diff_text),
                ..
            } = &part
            {
                if matches!(name.as_str(), "Write" | "Edit") {
                    if let Some(path) = input.get("file_path").and_then(serde_json::Value::as_str) {
                        let (added, deleted) = count_diff_lines(diff_text);
                        diffs.push(FileDiffSummary {
                            path: path.to_string(),
                            added,
                            deleted,
                        });
                    }
                }
            }

            message.parts[idx] = part.clone();
            self.bus.publish(LoopEvent::PartUpdated {
                session_id,
                message_id: message.id,
                part,
            });

            if token.is_cancelled() {
                break;
            }
        }

        if !diffs.is_empty() {
            for diff in diffs {
                session.summary.added_lines += diff.added;
                session.summary.deleted_lines += diff.deleted;
                match session.summary.files.iter_mut().find(|f| f.path == diff.path) {
                    Some(existing) => {
                        existing.added += diff.added;
                        existing.deleted += diff.deleted;
                    }
                    None => session.summary.files.push(diff),
                }
            }
            session.updated_at = chrono::Utc::now();
            if let Err(err) = self.storage.save_session(session).await {
                warn!(error = %err, "failed to persist session diff summary");
            } else {
                self.bus.publish(LoopEvent::SessionDiff {
                    session_id,
                    summary: session.summary.clone(),
                });
            }
        }
    }

    fn spawn_title_generation(self: &Arc<Self>, session: Session, history: &MessageHistory, model: &str) {
        let first_user_text = history
            .all()
            .iter()
            .find(|m| m.role == Role::User)
            .map(render_message_text)
            .unwrap_or_default();
        let processor = Arc::clone(self);
        let model = model.to_string();
        tokio::spawn(async move {
            let request = CompletionRequest {
                model,
                system_prompt: "Summarize the user's request in at most eight words. Respond with the title only."
                    .to_string(),
                messages: vec![ProviderMessage {
                    role: Role::User,
                    text: first_user_text,
                }],
                tools: Vec::new(),
                max_output_tokens: 32,
                temperature: 0.0,
                top_p: 1.0,
            };
            let mut stream = match processor.provider.create_completion(request).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "title generation failed to open stream");
                    return;
                }
            };
            let mut title = String::new();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => {
                        if let Some(content) = chunk.content {
                            crate::decoder::merge_text(&mut title, &content);
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "title generation stream error");
                        return;
                    }
                }
            }
            let title: String = title.trim().chars().take(TITLE_MAX_CHARS).collect();
            if title.is_empty() {
                return;
            }
            let mut session = session;
            session.title = Some(title);
            session.updated_at = chrono::Utc::now();
            if let Err(err) = processor.storage.save_session(&session).await {
                warn!(error = %err, "failed to persist generated session title");
            }
        });
    }
}

enum StepOutcome {
    FinishReason(FinishReason, loom_protocol::TokenUsage),
    Terminal(Result<(), LoopError>),
}

fn is_default_title(title: &Option<String>) -> bool {
    match title {
        None => true,
        Some(t) => t == DEFAULT_TITLE,
    }
}

fn storage_err(err: loom_error::Error) -> LoopError {
    StorageSnafu { message: err.to_string() }.build()
}

/// Counts added/deleted lines in a unified diff, for folding a tool's
/// per-call diff into the session's running [`loom_protocol::SessionSummary`].
fn count_diff_lines(diff: &str) -> (u32, u32) {
    let mut added = 0;
    let mut deleted = 0;
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if line.starts_with('+') {
            added += 1;
        } else if line.starts_with('-') {
            deleted += 1;
        }
    }
    (added, deleted)
}

fn filtered_registry(registry: &ToolRegistry, allowed: &[String]) -> ToolRegistry {
    let mut filtered = ToolRegistry::new();
    for name in registry.names() {
        if allowed.iter().any(|n| n == &name) {
            if let Some(tool) = registry.get(&name) {
                filtered.register(tool);
            }
        }
    }
    filtered
}

fn to_provider_message(message: &Message) -> ProviderMessage {
    ProviderMessage {
        role: message.role,
        text: render_message_text(message),
    }
}

fn render_message_text(message: &Message) -> String {
    let mut out = String::new();
    for part in &message.parts {
        match part {
            Part::Text { text } => out.push_str(text),
            Part::Reasoning { text } => out.push_str(text),
            Part::Tool { name, output, .. } => {
                out.push_str(&format!("[Tool: {name}]"));
                if let Some(output) = output {
                    out.push_str(output);
                }
            }
            Part::Compaction { summary, .. } => out.push_str(summary),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use loom_protocol::PermissionMode;
    use loom_protocol::TokenUsage;
    use loom_tools_api::Tool;
    use loom_tools_api::ToolOutput;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays one canned set of stream chunks per `create_completion`
    /// call. Once the script is exhausted, falls back to an endless
    /// `tool_calls` chunk so a misconfigured test fails with `MaxSteps`
    /// instead of hanging.
    struct ScriptedProvider {
        turns: Mutex<VecDeque<Vec<crate::traits::StreamChunk>>>,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<Vec<crate::traits::StreamChunk>>) -> Self {
            ScriptedProvider {
                turns: Mutex::new(turns.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn create_completion(
            &self,
            _request: CompletionRequest,
        ) -> loom_error::Result<stream::BoxStream<'static, loom_error::Result<crate::traits::StreamChunk>>>
        {
            let turn = self
                .turns
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
                .unwrap_or_else(|| {
                    vec![crate::traits::StreamChunk {
                        finish_reason: Some(FinishReason::ToolCalls),
                        ..Default::default()
                    }]
                });
            Ok(Box::pin(stream::iter(turn.into_iter().map(Ok))))
        }
    }

    #[derive(Default)]
    struct StubStorage {
        session: Mutex<Option<Session>>,
        messages: Mutex<Vec<Message>>,
        updated: Mutex<Vec<Message>>,
    }

    impl StubStorage {
        fn seeded(session: Session, messages: Vec<Message>) -> Self {
            StubStorage {
                session: Mutex::new(Some(session)),
                messages: Mutex::new(messages),
                updated: Mutex::new(Vec::new()),
            }
        }

        fn last_updated(&self) -> Message {
            self.updated
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .last()
                .cloned()
                .expect("at least one update_message call")
        }
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
            self.updated.lock().unwrap_or_else(|e| e.into_inner()).push(message.clone());
            Ok(())
        }
    }

    struct NullBus;
    impl EventBus for NullBus {
        fn publish(&self, _event: LoopEvent) {}
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "Echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        async fn execute(
            &self,
            input: serde_json::Value,
            _ctx: &mut ToolContext,
        ) -> std::result::Result<ToolOutput, loom_tools_api::ToolError> {
            Ok(ToolOutput::text(input.to_string()))
        }
    }

    /// Titled so `Processor::run_steps` skips title generation — that path
    /// spawns its own `create_completion` call against the same
    /// `ScriptedProvider` queue the step loop is consuming, and nothing
    /// orders the two against each other.
    fn seed_session_with_user_message() -> (Session, Message) {
        let mut session = Session::new("/work");
        session.title = Some("already titled".to_string());
        let user = Message::new(session.id, Role::User, vec![Part::text("hi")]);
        (session, user)
    }

    fn build_processor(provider: ScriptedProvider, storage: StubStorage, tool_registry: ToolRegistry) -> Arc<Processor> {
        Processor::new(
            Arc::new(storage),
            Arc::new(provider),
            Arc::new(NullBus),
            tool_registry,
            Arc::new(AgentRegistry::new()),
            "gpt-test",
            "gpt-test-compact",
        )
    }

    fn bypass_agent(tools: Vec<String>) -> AgentProfile {
        AgentProfile {
            name: "main".to_string(),
            system_prompt: String::new(),
            tools,
            model: None,
            permission_mode: PermissionMode::BypassPermissions,
            category_permissions: loom_protocol::CategoryPermissions::default(),
            permission_rules: Vec::new(),
        }
    }

    #[tokio::test]
    async fn single_text_step_finishes_with_stop_and_records_usage() {
        let (session, user) = seed_session_with_user_message();
        let session_id = session.id;
        let storage = StubStorage::seeded(session, vec![user]);
        let provider = ScriptedProvider::new(vec![vec![crate::traits::StreamChunk {
            content: Some("Hello".to_string()),
            finish_reason: Some(FinishReason::Stop),
            usage: Some(TokenUsage {
                input_tokens: 5,
                output_tokens: 2,
                ..Default::default()
            }),
            ..Default::default()
        }]]);
        let processor = build_processor(provider, storage, ToolRegistry::new());
        let stored = Arc::clone(processor.storage());

        processor
            .process(session_id, bypass_agent(Vec::new()))
            .await
            .expect("single-step run succeeds");

        let storage = stored.as_ref();
        // Downcast isn't available on `dyn Storage`; re-fetch the final
        // message through the same trait object instead.
        let messages = storage.load_messages(session_id).await.expect("load");
        let assistant = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .expect("assistant message present");
        assert!(matches!(
            assistant.parts.iter().find(|p| matches!(p, Part::Text { .. })),
            Some(Part::Text { text }) if text == "Hello"
        ));
        assert!(assistant.parts.iter().any(|p| matches!(
            p,
            Part::StepFinish {
                finish_reason: FinishReason::Stop,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn tool_call_step_runs_tool_then_continues_to_stop() {
        let (session, user) = seed_session_with_user_message();
        let session_id = session.id;
        let storage = StubStorage::seeded(session, vec![user]);
        let provider = ScriptedProvider::new(vec![
            vec![crate::traits::StreamChunk {
                tool_call_fragments: vec![crate::traits::ToolCallFragment {
                    id: "call-1".to_string(),
                    name: Some("Echo".to_string()),
                    arguments_fragment: "{}".to_string(),
                }],
                finish_reason: Some(FinishReason::ToolCalls),
                ..Default::default()
            }],
            vec![crate::traits::StreamChunk {
                content: Some("done".to_string()),
                finish_reason: Some(FinishReason::Stop),
                ..Default::default()
            }],
        ]);
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let processor = build_processor(provider, storage, registry);
        let storage_handle = Arc::clone(processor.storage());

        processor
            .process(session_id, bypass_agent(vec!["Echo".to_string()]))
            .await
            .expect("tool-calling run succeeds");

        let messages = storage_handle.load_messages(session_id).await.expect("load");
        let assistant = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .expect("assistant message present");
        assert!(assistant.parts.iter().any(|p| matches!(
            p,
            Part::Tool {
                name,
                state: loom_protocol::ToolState::Completed,
                ..
            } if name == "Echo"
        )));
        assert!(assistant.parts.iter().any(|p| matches!(p, Part::Text { text } if text == "done")));
    }

    #[tokio::test]
    async fn runaway_tool_calls_step_stop_at_max_steps() {
        let (session, user) = seed_session_with_user_message();
        let session_id = session.id;
        let storage = StubStorage::seeded(session, vec![user]);
        let provider = ScriptedProvider::new(Vec::new());
        let processor = build_processor(provider, storage, ToolRegistry::new());

        let result = processor.process(session_id, bypass_agent(Vec::new())).await;

        assert!(matches!(result, Err(LoopError::MaxSteps { .. })));
    }

    #[tokio::test]
    async fn missing_user_message_is_rejected() {
        let session = Session::new("/work");
        let session_id = session.id;
        let storage = StubStorage::seeded(session, Vec::new());
        let provider = ScriptedProvider::new(Vec::new());
        let processor = build_processor(provider, storage, ToolRegistry::new());

        let result = processor.process(session_id, bypass_agent(Vec::new())).await;

        assert!(matches!(result, Err(LoopError::NoUserMessage { .. })));
    }
}
