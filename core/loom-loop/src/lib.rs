//! The agentic processing loop: one provider round-trip per step, tool
//! execution between steps, compaction when the conversation outgrows its
//! token budget, and the single-writer-per-session concurrency guarantee
//! the rest of the system builds on.
//!
//! `Processor` is the crate's single entry point; everything else here is
//! a piece it composes (`StreamDecoder` for assembling provider chunks
//! into stable message parts, `RetryPolicy` for provider-failure backoff,
//! `Compactor` for folding old history into a summary, `TaskDispatcher`
//! for recursing into a subagent run from inside a tool call).

mod compactor;
mod decoder;
mod dispatcher;
mod error;
mod gate;
mod processor;
mod retry;
mod traits;

pub use compactor::Compactor;
pub use decoder::StreamDecoder;
pub use dispatcher::TaskDispatcher;
pub use error::LoopError;
pub use error::Result;
pub use gate::EventBusPermissionGate;
pub use loom_tools_api::PermissionDecision;
pub use processor::Processor;
pub use retry::RetryDecision;
pub use retry::RetryPolicy;
pub use traits::CompletionRequest;
pub use traits::EventBus;
pub use traits::Provider;
pub use traits::ProviderMessage;
pub use traits::StreamChunk;
pub use traits::Storage;
pub use traits::ToolCallFragment;
