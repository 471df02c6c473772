use crate::decoder::merge_text;
use crate::error::LoopError;
use crate::error::ProviderSnafu;
use crate::error::StorageSnafu;
use crate::traits::CompletionRequest;
use crate::traits::EventBus;
use crate::traits::Provider;
use crate::traits::ProviderMessage;
use crate::traits::Storage;
use futures::StreamExt;
use loom_message::MessageHistory;
use loom_prompt::SystemPromptBuilder;
use loom_protocol::CompactionReason;
use loom_protocol::LoopEvent;
use loom_protocol::Message;
use loom_protocol::Part;
use loom_protocol::Role;
use ulid::Ulid;

/// Messages at the tail of the visible history that are never folded into
/// a summary, regardless of token pressure.
const MIN_MESSAGES_TO_KEEP: usize = 4;
const SUMMARY_MAX_TOKENS: i32 = 2000;
const TOOL_OUTPUT_SNIPPET_LEN: usize = 500;
const CONTINUE_PROMPT: &str = "Continue if you have next steps";

/// Folds the oldest visible messages into a single summary message when
/// the conversation outgrows its token budget, per the specification's
/// Context Compaction behavior.
pub struct Compactor {
    compact_model: String,
}

impl Compactor {
    pub fn new(compact_model: impl Into<String>) -> Self {
        Compactor {
            compact_model: compact_model.into(),
        }
    }

    pub fn should_compact(&self, estimated_tokens: i64, threshold: i64) -> bool {
        estimated_tokens > threshold
    }

    /// Runs one compaction: summarizes `history.compactable_prefix`,
    /// persists the summary as a new `is_summary` assistant message, and
    /// (for auto-triggered compactions) appends a follow-up user message
    /// nudging the model to continue. Does nothing if there's no prefix
    /// left to fold.
    pub async fn compact(
        &self,
        session_id: Ulid,
        history: &mut MessageHistory,
        provider: &dyn Provider,
        storage: &dyn Storage,
        bus: &dyn EventBus,
        reason: CompactionReason,
        explicit: bool,
    ) -> Result<(), LoopError> {
        let prefix = history.compactable_prefix(MIN_MESSAGES_TO_KEEP);
        if prefix.is_empty() {
            return Ok(());
        }

        let conversation_text = render_conversation(prefix);
        let (system_prompt, user_prompt) =
            SystemPromptBuilder::build_summarization(&conversation_text, None);

        let request = CompletionRequest {
            model: self.compact_model.clone(),
            system_prompt,
            messages: vec![ProviderMessage {
                role: Role::User,
                text: user_prompt,
            }],
            tools: Vec::new(),
            max_output_tokens: SUMMARY_MAX_TOKENS,
            temperature: 0.0,
            top_p: 1.0,
        };

        let mut stream = provider
            .create_completion(request)
            .await
            .map_err(|e| ProviderSnafu { message: e.to_string() }.build())?;

        let mut summary = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ProviderSnafu { message: e.to_string() }.build())?;
            if let Some(content) = &chunk.content {
                merge_text(&mut summary, content);
            }
        }

        let mut summary_message = Message::new(
            session_id,
            Role::Assistant,
            vec![Part::Compaction {
                reason,
                summary: summary.clone(),
            }],
        );
        summary_message.is_summary = true;

        storage
            .append_message(&summary_message)
            .await
            .map_err(|e| StorageSnafu { message: e.to_string() }.build())?;
        history.push(summary_message);

        bus.publish(LoopEvent::Compacted { session_id, reason });

        if !explicit {
            let continue_message =
                Message::new(session_id, Role::User, vec![Part::text(CONTINUE_PROMPT)]);
            storage
                .append_message(&continue_message)
                .await
                .map_err(|e| StorageSnafu { message: e.to_string() }.build())?;
            history.push(continue_message);
        }

        Ok(())
    }
}

fn render_conversation(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(&format!("{:?}: ", message.role));
        for part in &message.parts {
            match part {
                Part::Text { text } => out.push_str(text),
                Part::Reasoning { text } => out.push_str(text),
                Part::Tool { name, output, .. } => {
                    out.push_str(&format!("[Tool: {name}]"));
                    if let Some(output) = output {
                        let snippet: String = output.chars().take(TOOL_OUTPUT_SNIPPET_LEN).collect();
                        out.push_str(&snippet);
                    }
                }
                _ => {}
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use loom_protocol::TokenUsage;
    use std::sync::Mutex;

    struct StubProvider {
        reply: String,
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn create_completion(
            &self,
            _request: CompletionRequest,
        ) -> loom_error::Result<futures::stream::BoxStream<'static, loom_error::Result<crate::traits::StreamChunk>>>
        {
            let chunk = crate::traits::StreamChunk {
                content: Some(self.reply.clone()),
                usage: Some(TokenUsage::default()),
                ..Default::default()
            };
            Ok(Box::pin(stream::iter(vec![Ok(chunk)])))
        }
    }

    #[derive(Default)]
    struct StubStorage {
        appended: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl Storage for StubStorage {
        async fn load_session(&self, _id: Ulid) -> loom_error::Result<Option<loom_protocol::Session>> {
            Ok(None)
        }
        async fn save_session(&self, _session: &loom_protocol::Session) -> loom_error::Result<()> {
            Ok(())
        }
        async fn load_messages(&self, _session_id: Ulid) -> loom_error::Result<Vec<Message>> {
            Ok(Vec::new())
        }
        async fn append_message(&self, message: &Message) -> loom_error::Result<()> {
            self.appended.lock().expect("lock").push(message.clone());
            Ok(())
        }
        async fn update_message(&self, _message: &Message) -> loom_error::Result<()> {
            Ok(())
        }
    }

    struct NullBus;
    impl EventBus for NullBus {
        fn publish(&self, _event: LoopEvent) {}
    }

    fn text_message(session_id: Ulid, role: Role, text: &str) -> Message {
        Message::new(session_id, role, vec![Part::text(text)])
    }

    #[tokio::test]
    async fn auto_compaction_appends_summary_and_continue_message() {
        let session_id = Ulid::new();
        let mut history = MessageHistory::default();
        for i in 0..8 {
            history.push(text_message(session_id, Role::User, &format!("message {i}")));
        }

        let compactor = Compactor::new("gpt-test");
        let provider = StubProvider {
            reply: "summary of the conversation".to_string(),
        };
        let storage = StubStorage::default();
        let bus = NullBus;

        compactor
            .compact(
                session_id,
                &mut history,
                &provider,
                &storage,
                &bus,
                CompactionReason::TokenThreshold,
                false,
            )
            .await
            .expect("compaction succeeds");

        let appended = storage.appended.lock().expect("lock");
        assert_eq!(appended.len(), 2);
        assert!(appended[0].is_summary);
        match &appended[1].parts[0] {
            Part::Text { text } => assert_eq!(text, CONTINUE_PROMPT),
            other => panic!("expected continue prompt, got {other:?}"),
        }
    }

    #[test]
    fn should_compact_compares_against_threshold() {
        let compactor = Compactor::new("gpt-test");
        assert!(compactor.should_compact(150_001, 150_000));
        assert!(!compactor.should_compact(150_000, 150_000));
    }
}
