use crate::sections::PromptSection;
use crate::sections::assemble_sections;
use crate::sections::generate_tool_policy_lines;
use crate::sections::mcp_instructions;
use crate::sections::permission_section;
use crate::sections::render_environment;
use crate::sections::render_memory_files;
use crate::templates;
use loom_context::ConversationContext;

/// Assembles the ordered system prompt for a turn, a subagent, or a
/// compaction/summarization request. Pure string assembly — no I/O, no
/// async — so it can run inline on the processor's hot path.
pub struct SystemPromptBuilder;

impl SystemPromptBuilder {
    /// Build the full system prompt for a top-level session turn.
    pub fn build(ctx: &ConversationContext) -> String {
        let mut sections: Vec<(PromptSection, String)> = vec![
            (PromptSection::Identity, templates::BASE_IDENTITY.to_string()),
        ];

        if ctx.has_tools() {
            sections.push((PromptSection::ToolPolicy, generate_tool_policy_lines(ctx)));
        }

        sections.push((PromptSection::Security, templates::SECURITY.to_string()));

        if ctx.has_mcp_servers() {
            sections.push((PromptSection::ToolPolicy, mcp_instructions(ctx)));
        }

        sections.push((PromptSection::Environment, render_environment(ctx)));
        sections.push((
            PromptSection::Permission,
            permission_section(&ctx.permission_mode),
        ));

        if !ctx.memory_files.is_empty() {
            sections.push((PromptSection::MemoryFiles, render_memory_files(ctx)));
        }

        assemble_sections(&sections)
    }

    /// Build the narrower prompt a subagent runs with: identity for its
    /// profile, security boilerplate, environment, and memory files —
    /// deliberately no tool policy or permission section, since the
    /// Task Dispatcher fixes a subagent's tool set and permission mode
    /// independently of what the prompt says.
    pub fn build_for_subagent(ctx: &ConversationContext, subagent_type: &str) -> String {
        let identity = match subagent_type {
            "explore" => templates::EXPLORE_SUBAGENT_IDENTITY,
            "plan" => templates::PLAN_SUBAGENT_IDENTITY,
            _ => templates::BASE_IDENTITY,
        };
        let sections = vec![
            (PromptSection::Identity, identity.to_string()),
            (PromptSection::Security, templates::SECURITY.to_string()),
            (PromptSection::Environment, render_environment(ctx)),
        ];
        assemble_sections(&sections)
    }

    /// System/user prompt pair for a Tier-2 compaction summarization call.
    pub fn build_summarization(
        conversation_text: &str,
        custom_instructions: Option<&str>,
    ) -> (String, String) {
        crate::summarization::build_summarization_prompt(conversation_text, custom_instructions)
    }

    /// System/user prompt pair for a lightweight Tier-1 session-memory note.
    pub fn build_brief_summarization(conversation_text: &str) -> (String, String) {
        crate::summarization::build_brief_summary_prompt(conversation_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_context::EnvironmentInfo;

    fn ctx() -> ConversationContext {
        let env = EnvironmentInfo::builder()
            .cwd(std::path::PathBuf::from("/work"))
            .model("test-model")
            .build()
            .unwrap();
        ConversationContext::builder()
            .environment(env)
            .tool_names(vec!["Bash".to_string(), "Read".to_string()])
            .build()
            .unwrap()
    }

    #[test]
    fn build_includes_tool_policy_when_tools_present() {
        let prompt = SystemPromptBuilder::build(&ctx());
        assert!(prompt.contains("Tool usage"));
        assert!(prompt.contains("Bash"));
    }

    #[test]
    fn build_for_subagent_omits_tool_policy() {
        let prompt = SystemPromptBuilder::build_for_subagent(&ctx(), "explore");
        assert!(prompt.contains("read-only research subagent"));
        assert!(!prompt.contains("Tool usage"));
    }
}
