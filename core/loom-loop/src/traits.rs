use async_trait::async_trait;
use futures::stream::BoxStream;
use loom_protocol::FinishReason;
use loom_protocol::Message;
use loom_protocol::Session;
use loom_protocol::TokenUsage;
use loom_protocol::ToolDefinition;
use ulid::Ulid;

/// One role-tagged message as handed to the provider, converted from the
/// session's `Message`/`Part` history by the Processor.
#[derive(Debug, Clone)]
pub struct ProviderMessage {
    pub role: loom_protocol::Role,
    pub text: String,
}

/// What the Processor asks the Provider to complete.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<ProviderMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_output_tokens: i32,
    pub temperature: f32,
    pub top_p: f32,
}

/// One incremental fragment of a tool call's arguments, keyed by the
/// provider-assigned call id. `name` is only present on the fragment that
/// first introduces the call.
#[derive(Debug, Clone, Default)]
pub struct ToolCallFragment {
    pub id: String,
    pub name: Option<String>,
    pub arguments_fragment: String,
}

/// One chunk of a streaming completion. Every field is optional because a
/// single chunk typically carries only one kind of update; the Stream
/// Decoder is what assembles a sequence of these into stable parts.
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    /// Either the delta since the last chunk or the full accumulated text
    /// so far — the Stream Decoder infers which by comparing lengths.
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub tool_call_fragments: Vec<ToolCallFragment>,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<FinishReason>,
}

/// Narrow interface onto the LLM provider. Out of scope per the
/// specification's external-collaborator list; a concrete HTTP-backed
/// implementation is the demonstration binary's concern, not this crate's.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> loom_error::Result<BoxStream<'static, loom_error::Result<StreamChunk>>>;
}

/// Narrow interface onto session/message persistence. `update_message`
/// overwrites the stored copy of a message whose parts changed in place
/// (the assistant message the Processor is actively writing); `Storage`
/// implementations are expected to be idempotent on repeated writes of
/// the same message id.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn load_session(&self, id: Ulid) -> loom_error::Result<Option<Session>>;
    async fn save_session(&self, session: &Session) -> loom_error::Result<()>;
    async fn load_messages(&self, session_id: Ulid) -> loom_error::Result<Vec<Message>>;
    async fn append_message(&self, message: &Message) -> loom_error::Result<()>;
    async fn update_message(&self, message: &Message) -> loom_error::Result<()>;
}

/// Non-blocking observer sink. Implementations must never block the
/// caller — a full channel drops the event rather than stalling the run,
/// per the specification's event-bus contract.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: loom_protocol::LoopEvent);
}
