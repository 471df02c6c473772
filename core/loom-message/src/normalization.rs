use loom_protocol::ToolState;

/// Map a provider-reported completion into the tool call's recorded
/// state. `success` distinguishes a normal completion from one the Tool
/// Executor marked as a failure without rejecting the call outright.
pub fn normalize_tool_state(success: bool) -> ToolState {
    if success {
        ToolState::Completed
    } else {
        ToolState::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_maps_to_completed() {
        assert_eq!(normalize_tool_state(true), ToolState::Completed);
    }

    #[test]
    fn failure_maps_to_error() {
        assert_eq!(normalize_tool_state(false), ToolState::Error);
    }
}
