use loom_context::ConversationContext;
use loom_protocol::PermissionMode;

/// An ordered prompt section. Variants are joined by
/// [`assemble_sections`] with a blank line between each non-empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSection {
    Identity,
    ToolPolicy,
    Security,
    Permission,
    Environment,
    MemoryFiles,
    Injection,
}

pub fn generate_tool_policy_lines(ctx: &ConversationContext) -> String {
    let mut lines = vec![crate::templates::TOOL_POLICY_HEADER.to_string()];
    if !ctx.tool_names.is_empty() {
        lines.push(format!("Available tools: {}", ctx.tool_names.join(", ")));
    }
    lines.join("\n")
}

pub fn mcp_instructions(ctx: &ConversationContext) -> String {
    format!(
        "## MCP servers\nConnected: {}. Their tools are exposed with a \
         `<server>_<tool>` name prefix.",
        ctx.mcp_server_names.join(", ")
    )
}

pub fn permission_section(mode: &PermissionMode) -> String {
    match mode {
        PermissionMode::Default => crate::templates::PERMISSION_DEFAULT.to_string(),
        PermissionMode::AcceptEdits => crate::templates::PERMISSION_ACCEPT_EDITS.to_string(),
        PermissionMode::BypassPermissions => crate::templates::PERMISSION_BYPASS.to_string(),
        PermissionMode::Plan => crate::templates::PERMISSION_PLAN.to_string(),
    }
}

pub fn render_environment(ctx: &ConversationContext) -> String {
    let env = &ctx.environment;
    let mut lines = vec![
        "## Environment".to_string(),
        format!("Working directory: {}", env.cwd.display()),
        format!("Platform: {}", env.platform),
        format!("Date: {}", env.date),
    ];
    if env.is_git_repo {
        match &env.git_branch {
            Some(branch) => lines.push(format!("Git branch: {branch}")),
            None => lines.push("Git repository (branch unknown)".to_string()),
        }
    }
    if let Some(lang) = &env.language_preference {
        lines.push(format!("Respond in: {lang}"));
    }
    lines.join("\n")
}

pub fn render_memory_files(ctx: &ConversationContext) -> String {
    let mut out = vec!["## Project memory".to_string()];
    for file in &ctx.memory_files {
        out.push(format!("### {}\n{}", file.path.display(), file.content));
    }
    out.join("\n\n")
}

/// Join ordered, non-empty section bodies with a blank line between each.
pub fn assemble_sections(sections: &[(PromptSection, String)]) -> String {
    sections
        .iter()
        .map(|(_, body)| body.as_str())
        .filter(|body| !body.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Replace `{{var}}` placeholders with values from `vars`. Unmatched
/// placeholders are left as-is rather than erroring — most callers only
/// supply a partial variable set for a subset of a static template.
pub fn substitute_vars(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_vars_replaces_known_placeholders() {
        let result = substitute_vars("hello {{name}}", &[("name", "world")]);
        assert_eq!(result, "hello world");
    }

    #[test]
    fn substitute_vars_leaves_unknown_placeholders() {
        let result = substitute_vars("hello {{name}}", &[]);
        assert_eq!(result, "hello {{name}}");
    }

    #[test]
    fn assemble_sections_skips_empty_bodies() {
        let sections = vec![
            (PromptSection::Identity, "id".to_string()),
            (PromptSection::Security, String::new()),
            (PromptSection::Permission, "perm".to_string()),
        ];
        assert_eq!(assemble_sections(&sections), "id\n\nperm");
    }
}
