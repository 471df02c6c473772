use snafu::Location;
use snafu::Snafu;

/// Errors a [`crate::Tool`] implementation can raise. Distinct from
/// [`loom_error::Error`]: a `ToolError` is scoped to a single call and
/// the Tool Executor decides whether it becomes a `Part::Tool { state:
/// Error, .. }` (most cases) or escalates to the session-level error
/// (a malformed schema reaching the executor at all, for instance).
pub mod tool_error {
    pub use super::ToolError;
    pub use super::ExecutionFailedSnafu;
    pub use super::HookRejectedSnafu;
    pub use super::InvalidInputSnafu;
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ToolError {
    #[snafu(display("invalid input: {message}"))]
    InvalidInput {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("execution failed: {message}"))]
    ExecutionFailed {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("hook rejected tool call: {reason}"))]
    HookRejected {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T, E = ToolError> = std::result::Result<T, E>;
