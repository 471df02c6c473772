use crate::traits::EventBus;
use crate::traits::StreamChunk;
use loom_protocol::FinishReason;
use loom_protocol::LoopEvent;
use loom_protocol::Message;
use loom_protocol::Part;
use loom_protocol::TokenUsage;
use loom_protocol::ToolState;
use std::collections::HashMap;
use ulid::Ulid;

/// Accumulates a stream of provider chunks into the current assistant
/// message's parts and a running token usage total. One instance is
/// scoped to a single step (one request/response round); the Processor
/// constructs a fresh decoder for every step.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    text_accum: String,
    reasoning_accum: String,
    text_part_index: Option<usize>,
    reasoning_part_index: Option<usize>,
    tool_part_index: HashMap<String, usize>,
    tool_raw: HashMap<String, String>,
    usage: TokenUsage,
}

/// Appends `new_content` to `accum` per the decoder's accumulation-vs-delta
/// rule: a longer payload is assumed to be the full accumulation so far
/// (append only the new suffix); a same-length-or-shorter payload is
/// assumed to already be a delta (append it verbatim).
pub(crate) fn merge_text(accum: &mut String, new_content: &str) {
    if new_content.len() > accum.len() {
        let suffix = new_content.get(accum.len()..).unwrap_or(new_content);
        accum.push_str(suffix);
    } else {
        accum.push_str(new_content);
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        StreamDecoder::default()
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Applies one chunk's updates to `message`, publishing `PartUpdated`
    /// for every part it touches.
    pub fn apply_chunk(
        &mut self,
        message: &mut Message,
        chunk: &StreamChunk,
        bus: &dyn EventBus,
        session_id: Ulid,
    ) {
        if let Some(content) = &chunk.content {
            let idx = *self.text_part_index.get_or_insert_with(|| {
                message.parts.push(Part::text(String::new()));
                message.parts.len() - 1
            });
            merge_text(&mut self.text_accum, content);
            message.parts[idx] = Part::Text {
                text: self.text_accum.clone(),
            };
            bus.publish(LoopEvent::PartUpdated {
                session_id,
                message_id: message.id,
                part: message.parts[idx].clone(),
            });
        }

        if let Some(reasoning) = &chunk.reasoning {
            let idx = *self.reasoning_part_index.get_or_insert_with(|| {
                message.parts.push(Part::Reasoning {
                    text: String::new(),
                });
                message.parts.len() - 1
            });
            merge_text(&mut self.reasoning_accum, reasoning);
            message.parts[idx] = Part::Reasoning {
                text: self.reasoning_accum.clone(),
            };
            bus.publish(LoopEvent::PartUpdated {
                session_id,
                message_id: message.id,
                part: message.parts[idx].clone(),
            });
        }

        for fragment in &chunk.tool_call_fragments {
            let idx = *self.tool_part_index.entry(fragment.id.clone()).or_insert_with(|| {
                message.parts.push(Part::Tool {
                    call_id: fragment.id.clone(),
                    name: fragment.name.clone().unwrap_or_default(),
                    input: serde_json::json!({}),
                    state: ToolState::Pending,
                    output: None,
                    diff: None,
                    error: None,
                });
                message.parts.len() - 1
            });
            let raw = self.tool_raw.entry(fragment.id.clone()).or_default();
            raw.push_str(&fragment.arguments_fragment);

            if let Part::Tool { name, input, .. } = &mut message.parts[idx] {
                if let Some(new_name) = &fragment.name {
                    if name.is_empty() {
                        *name = new_name.clone();
                    }
                }
                // Parse failures are expected: the model emits JSON
                // incrementally and most partial fragments aren't valid yet.
                if let Ok(parsed) = serde_json::from_str(raw) {
                    *input = parsed;
                }
            }
            bus.publish(LoopEvent::PartUpdated {
                session_id,
                message_id: message.id,
                part: message.parts[idx].clone(),
            });
        }

        if let Some(usage) = &chunk.usage {
            self.usage.merge_max(usage);
        }
    }

    /// Finalizes open Tool parts (final parse of accumulated raw input,
    /// transition to `running` so the Tool Executor picks them up next)
    /// and normalizes the finish reason reported by the stream, defaulting
    /// to `tool_calls` if any tool parts were opened and `stop` otherwise.
    pub fn finish(&mut self, message: &mut Message, reported: Option<FinishReason>) -> FinishReason {
        for (call_id, idx) in &self.tool_part_index {
            if let Some(raw) = self.tool_raw.get(call_id) {
                if let Ok(parsed) = serde_json::from_str(raw) {
                    if let Part::Tool { input, .. } = &mut message.parts[*idx] {
                        *input = parsed;
                    }
                }
            }
            if let Part::Tool { state, .. } = &mut message.parts[*idx] {
                *state = ToolState::Running;
            }
        }

        reported.unwrap_or(if self.tool_part_index.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_protocol::Role;

    struct NullBus;
    impl EventBus for NullBus {
        fn publish(&self, _event: LoopEvent) {}
    }

    fn message() -> Message {
        Message::new(Ulid::new(), Role::Assistant, Vec::new())
    }

    #[test]
    fn accumulation_and_delta_chunks_reconstruct_final_text() {
        let mut decoder = StreamDecoder::new();
        let mut msg = message();
        let bus = NullBus;

        decoder.apply_chunk(
            &mut msg,
            &StreamChunk {
                content: Some("He".to_string()),
                ..Default::default()
            },
            &bus,
            msg.session_id,
        );
        decoder.apply_chunk(
            &mut msg,
            &StreamChunk {
                content: Some("Hello".to_string()),
                ..Default::default()
            },
            &bus,
            msg.session_id,
        );

        match &msg.parts[0] {
            Part::Text { text } => assert_eq!(text, "Hello"),
            other => panic!("expected Part::Text, got {other:?}"),
        }
    }

    #[test]
    fn tool_call_fragments_accumulate_into_parseable_input() {
        let mut decoder = StreamDecoder::new();
        let mut msg = message();
        let bus = NullBus;

        decoder.apply_chunk(
            &mut msg,
            &StreamChunk {
                tool_call_fragments: vec![crate::traits::ToolCallFragment {
                    id: "t1".to_string(),
                    name: Some("calc_sum".to_string()),
                    arguments_fragment: "{\"numbers\"".to_string(),
                }],
                ..Default::default()
            },
            &bus,
            msg.session_id,
        );
        decoder.apply_chunk(
            &mut msg,
            &StreamChunk {
                tool_call_fragments: vec![crate::traits::ToolCallFragment {
                    id: "t1".to_string(),
                    name: None,
                    arguments_fragment: ":[1,2,3]}".to_string(),
                }],
                ..Default::default()
            },
            &bus,
            msg.session_id,
        );

        let finish_reason = decoder.finish(&mut msg, Some(FinishReason::ToolCalls));
        assert_eq!(finish_reason, FinishReason::ToolCalls);
        match &msg.parts[0] {
            Part::Tool { input, state, name, .. } => {
                assert_eq!(name, "calc_sum");
                assert_eq!(input, &serde_json::json!({"numbers": [1, 2, 3]}));
                assert_eq!(*state, ToolState::Running);
            }
            other => panic!("expected Part::Tool, got {other:?}"),
        }
    }

    #[test]
    fn token_usage_merges_by_max() {
        let mut decoder = StreamDecoder::new();
        let mut msg = message();
        let bus = NullBus;

        decoder.apply_chunk(
            &mut msg,
            &StreamChunk {
                usage: Some(TokenUsage {
                    input_tokens: 10,
                    output_tokens: 1,
                    ..Default::default()
                }),
                ..Default::default()
            },
            &bus,
            msg.session_id,
        );
        decoder.apply_chunk(
            &mut msg,
            &StreamChunk {
                usage: Some(TokenUsage {
                    input_tokens: 2,
                    output_tokens: 5,
                    ..Default::default()
                }),
                ..Default::default()
            },
            &bus,
            msg.session_id,
        );

        assert_eq!(decoder.usage().input_tokens, 10);
        assert_eq!(decoder.usage().output_tokens, 5);
    }

    #[test]
    fn finish_defaults_to_stop_without_tool_parts() {
        let mut decoder = StreamDecoder::new();
        let mut msg = message();
        assert_eq!(decoder.finish(&mut msg, None), FinishReason::Stop);
    }
}
