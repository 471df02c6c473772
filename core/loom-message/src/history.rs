use loom_protocol::Message;
use loom_protocol::Part;
use loom_protocol::TokenUsage;
use ulid::Ulid;

/// Ordered, append-only message log for one session. Compaction does not
/// delete history — it inserts a `Part::Compaction` summary and flags the
/// synthetic message `is_summary = true`; `visible_messages` is what
/// actually decides what the provider sees on the next turn.
#[derive(Debug, Clone, Default)]
pub struct MessageHistory {
    messages: Vec<Message>,
}

impl MessageHistory {
    pub fn new() -> Self {
        MessageHistory::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn get_mut(&mut self, id: Ulid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Sum of the most recent `StepFinish` usage report, which is what a
    /// provider typically returns as the cumulative total for the
    /// request just completed — not a sum across all turns.
    pub fn last_reported_usage(&self) -> TokenUsage {
        self.messages
            .iter()
            .rev()
            .flat_map(|m| m.parts.iter().rev())
            .find_map(|part| match part {
                Part::StepFinish { usage, .. } => Some(*usage),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Index of the most recent summary message, if any compaction has
    /// happened yet.
    fn last_summary_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.is_summary)
    }

    /// Messages the provider should see on the next turn: if a
    /// compaction has occurred, the summary message plus everything
    /// after it; otherwise the full history.
    pub fn visible_messages(&self) -> &[Message] {
        match self.last_summary_index() {
            Some(idx) => &self.messages[idx..],
            None => &self.messages,
        }
    }

    /// Messages eligible to be dropped by a Tier-2 compaction, keeping
    /// the most recent `min_keep` untouched regardless of token count.
    pub fn compactable_prefix(&self, min_keep: usize) -> &[Message] {
        let visible = self.visible_messages();
        if visible.len() <= min_keep {
            &[]
        } else {
            &visible[..visible.len() - min_keep]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_protocol::FinishReason;
    use loom_protocol::Role;

    fn session_id() -> Ulid {
        Ulid::new()
    }

    #[test]
    fn visible_messages_returns_everything_before_first_compaction() {
        let sid = session_id();
        let mut history = MessageHistory::new();
        for _ in 0..5 {
            history.push(Message::new(sid, Role::User, vec![Part::text("hi")]));
        }
        assert_eq!(history.visible_messages().len(), 5);
    }

    #[test]
    fn visible_messages_starts_at_latest_summary() {
        let sid = session_id();
        let mut history = MessageHistory::new();
        for _ in 0..3 {
            history.push(Message::new(sid, Role::User, vec![Part::text("old")]));
        }
        let mut summary = Message::new(
            sid,
            Role::Assistant,
            vec![Part::Compaction {
                reason: loom_protocol::CompactionReason::TokenThreshold,
                summary: "recap".to_string(),
            }],
        );
        summary.is_summary = true;
        history.push(summary);
        history.push(Message::new(sid, Role::User, vec![Part::text("new")]));

        assert_eq!(history.visible_messages().len(), 2);
    }

    #[test]
    fn last_reported_usage_reads_most_recent_step_finish() {
        let sid = session_id();
        let mut history = MessageHistory::new();
        history.push(Message::new(
            sid,
            Role::Assistant,
            vec![Part::StepFinish {
                finish_reason: FinishReason::Stop,
                usage: TokenUsage {
                    input_tokens: 100,
                    output_tokens: 20,
                    ..Default::default()
                },
            }],
        ));
        assert_eq!(history.last_reported_usage().input_tokens, 100);
    }
}
