use async_trait::async_trait;
use futures::stream;
use futures::stream::BoxStream;
use loom_loop::CompletionRequest;
use loom_loop::Provider;
use loom_loop::StreamChunk;
use loom_loop::ToolCallFragment;
use loom_protocol::FinishReason;
use loom_protocol::Role;

/// Stands in for a real model backend so the demonstration binary runs
/// without network access or API credentials. Recognizes one command,
/// `/bash <command>`, by emitting a `Bash` tool call; everything else is
/// echoed back verbatim. Real provider clients (HTTP-backed, streaming
/// SSE/JSON) are out of scope per the specification's external-interfaces
/// section — this is deliberately not one.
#[derive(Default)]
pub struct EchoProvider;

#[async_trait]
impl Provider for EchoProvider {
    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> loom_error::Result<BoxStream<'static, loom_error::Result<StreamChunk>>> {
        let chunk = match request.messages.last() {
            Some(message) if message.role == Role::User => {
                if let Some(command) = message.text.strip_prefix("/bash ") {
                    tool_call_chunk(command)
                } else {
                    text_chunk(format!("You said: {}", message.text))
                }
            }
            Some(message) => text_chunk(format!("Noted. {}", message.text)),
            None => text_chunk("Hello! How can I help?".to_string()),
        };
        Ok(Box::pin(stream::iter(vec![Ok(chunk)])))
    }
}

fn text_chunk(content: String) -> StreamChunk {
    StreamChunk {
        content: Some(content),
        finish_reason: Some(FinishReason::Stop),
        ..Default::default()
    }
}

fn tool_call_chunk(command: &str) -> StreamChunk {
    let arguments = serde_json::json!({
        "command": command,
        "description": "demo shell command requested via /bash",
    })
    .to_string();
    StreamChunk {
        tool_call_fragments: vec![ToolCallFragment {
            id: "demo-call-1".to_string(),
            name: Some("Bash".to_string()),
            arguments_fragment: arguments,
        }],
        finish_reason: Some(FinishReason::ToolCalls),
        ..Default::default()
    }
}
