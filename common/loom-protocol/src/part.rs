use crate::FinishReason;
use crate::TokenUsage;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A tool call's lifecycle state as tracked inside a [`Part::Tool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    Pending,
    Running,
    Completed,
    Error,
}

/// Why a [`Part::Compaction`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionReason {
    /// Tier-2: the running token total crossed the configured threshold.
    TokenThreshold,
    /// Tier-1: a lightweight session-memory note written between turns.
    SessionMemory,
    /// Explicitly requested (e.g. a user-issued `/compact`).
    Manual,
}

/// One unit of a [`crate::Message`]'s content. Parts are the atoms the
/// Stream Decoder produces and the Processor/Loop persists; a single
/// assistant turn is usually `[StepStart, Text, Tool, Tool, StepFinish]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    Tool {
        call_id: String,
        name: String,
        input: Value,
        state: ToolState,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        diff: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    File {
        path: String,
        content: String,
    },
    StepStart,
    StepFinish {
        finish_reason: FinishReason,
        usage: TokenUsage,
    },
    Compaction {
        reason: CompactionReason,
        summary: String,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// True for parts that still need provider-facing resolution (a tool
    /// call awaiting approval or still running).
    pub fn is_open_tool_call(&self) -> bool {
        matches!(
            self,
            Part::Tool {
                state: ToolState::Pending | ToolState::Running,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_tool_call_detection() {
        let running = Part::Tool {
            call_id: "c1".into(),
            name: "Bash".into(),
            input: serde_json::json!({}),
            state: ToolState::Running,
            output: None,
            diff: None,
            error: None,
        };
        assert!(running.is_open_tool_call());

        let done = Part::Tool {
            state: ToolState::Completed,
            ..running
        };
        assert!(!done.is_open_tool_call());
    }
}
