use std::path::PathBuf;

/// A side effect a tool's success should have on the surrounding
/// conversation context beyond its own output text — e.g. Edit/Write
/// updating the "this file was read at content X" tracker so a later
/// Edit call in the same turn doesn't see a stale hash.
#[derive(Debug, Clone)]
pub enum ContextModifier {
    FileRead { path: PathBuf, content: String },
}

/// Result of a successful tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
    /// Unified diff produced for a file-mutating tool; the Tool Executor
    /// records this on the `Part::Tool` alongside the textual result.
    pub diff: Option<String>,
    pub modifiers: Vec<ContextModifier>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        ToolOutput {
            content: content.into(),
            is_error: false,
            diff: None,
            modifiers: Vec::new(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        ToolOutput {
            content: content.into(),
            is_error: true,
            diff: None,
            modifiers: Vec::new(),
        }
    }

    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff = Some(diff.into());
        self
    }
}
