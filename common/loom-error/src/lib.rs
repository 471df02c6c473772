//! Shared error taxonomy for the loom runtime.
//!
//! Every crate in the workspace maps its failures onto [`StatusCode`] so
//! that callers at the edge (HTTP handlers, CLI exit codes, event bus
//! payloads) can classify an error without knowing which crate raised it.

mod status_code;

pub use status_code::StatusCode;

use snafu::Location;
use snafu::Snafu;

/// Top-level error shared across the processing loop, tool executor, and
/// context/prompt layers. Component-specific error enums (see
/// `loom-tools::error::ToolError`, `loom-loop::error::LoopError`) convert
/// into this type at their crate boundary via `#[snafu(context(false))]`
/// or explicit `From` impls.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("aborted: {reason}"))]
    Aborted {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("provider error: {message}"))]
    Provider {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("output length exceeded: {message}"))]
    OutputLength {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("max steps ({limit}) exceeded"))]
    MaxSteps {
        limit: u32,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("tool not found: {name}"))]
    ToolNotFound {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("tool call rejected: {reason}"))]
    ToolRejected {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("doom loop detected: {tool_name} called {count} times with identical input"))]
    DoomLoop {
        tool_name: String,
        count: u32,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("path escapes external directory root: {path}"))]
    ExternalDir {
        path: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("permission denied: {reason}"))]
    PermissionDenied {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("storage error: {message}"))]
    Storage {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("marshal error: {message}"))]
    Marshal {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("schema error: {message}"))]
    Schema {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("config error: {message}"))]
    Config {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Error {
    /// Classify this error onto a [`StatusCode`] for edge-layer reporting.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Aborted { .. } => StatusCode::Cancelled,
            Error::Provider { .. } => StatusCode::Unavailable,
            Error::OutputLength { .. } => StatusCode::ResourceExhausted,
            Error::MaxSteps { .. } => StatusCode::ResourceExhausted,
            Error::ToolNotFound { .. } => StatusCode::NotFound,
            Error::ToolRejected { .. } => StatusCode::PermissionDenied,
            Error::DoomLoop { .. } => StatusCode::FailedPrecondition,
            Error::ExternalDir { .. } => StatusCode::PermissionDenied,
            Error::PermissionDenied { .. } => StatusCode::PermissionDenied,
            Error::Storage { .. } => StatusCode::Internal,
            Error::Marshal { .. } => StatusCode::InvalidArgument,
            Error::Schema { .. } => StatusCode::InvalidArgument,
            Error::Config { .. } => StatusCode::InvalidArgument,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doom_loop_maps_to_failed_precondition() {
        let err = DoomLoopSnafu {
            tool_name: "Bash",
            count: 3u32,
        }
        .build();
        assert_eq!(err.status_code(), StatusCode::FailedPrecondition);
        assert!(err.to_string().contains("doom loop"));
    }

    #[test]
    fn tool_not_found_maps_to_not_found() {
        let err = ToolNotFoundSnafu { name: "Unknown" }.build();
        assert_eq!(err.status_code(), StatusCode::NotFound);
    }
}
