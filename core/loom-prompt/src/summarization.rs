/// System/user prompt pair for the Tier-2 compaction summary: a
/// comprehensive recap the Compactor stores as a
/// `Part::Compaction { reason: TokenThreshold, .. }`.
pub fn build_summarization_prompt(
    conversation_text: &str,
    custom_instructions: Option<&str>,
) -> (String, String) {
    let mut system = String::from(
        "Summarize the conversation below for continuation by another \
         assistant instance. Preserve: the user's original goal, \
         decisions made, files touched, and any unresolved next steps. \
         Be concrete; do not editorialize.",
    );
    if let Some(extra) = custom_instructions {
        system.push_str("\n\n");
        system.push_str(extra);
    }
    let user = format!("Conversation to summarize:\n\n{conversation_text}");
    (system, user)
}

/// System/user prompt pair for a Tier-1 session-memory note: a short,
/// cheap note written between turns rather than a full summarization.
pub fn build_brief_summary_prompt(conversation_text: &str) -> (String, String) {
    let system = String::from(
        "Write a one or two sentence memory note capturing what just \
         happened in this conversation turn, for quick recall later.",
    );
    let user = format!("Turn to summarize:\n\n{conversation_text}");
    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarization_prompt_includes_custom_instructions() {
        let (system, _) = build_summarization_prompt("...", Some("Focus on test coverage."));
        assert!(system.contains("Focus on test coverage."));
    }

    #[test]
    fn brief_summary_prompt_is_shorter_intent() {
        let (system, user) = build_brief_summary_prompt("user asked to fix a bug");
        assert!(system.contains("one or two sentence"));
        assert!(user.contains("user asked to fix a bug"));
    }
}
