use snafu::Location;
use snafu::Snafu;

/// Errors local to driving one turn of the agentic loop. Distinct from
/// [`loom_error::Error`] per that crate's own doc comment: this type
/// converts into it at the crate boundary (via the `From` impl below),
/// it doesn't replace it.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoopError {
    #[snafu(display("session {session_id} not found"))]
    SessionNotFound {
        session_id: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("session {session_id} has no trailing user message"))]
    NoUserMessage {
        session_id: String,
        #[snafu(implicit)]
        location: Location,
    },

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

    #[snafu(display("storage error: {message}"))]
    Storage {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("a run is already in progress for session {session_id}"))]
    AlreadyProcessing {
        session_id: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("subagent dispatch failed: {message}"))]
    Subagent {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
}

impl From<LoopError> for loom_error::Error {
    fn from(err: LoopError) -> Self {
        match err {
            LoopError::SessionNotFound { session_id, .. } => loom_error::StorageSnafu {
                message: format!("session {session_id} not found"),
            }
            .build(),
            LoopError::NoUserMessage { session_id, .. } => loom_error::ConfigSnafu {
                message: format!("session {session_id} has no trailing user message"),
            }
            .build(),
            LoopError::Aborted { reason, .. } => loom_error::AbortedSnafu { reason }.build(),
            LoopError::Provider { message, .. } => loom_error::ProviderSnafu { message }.build(),
            LoopError::OutputLength { message, .. } => {
                loom_error::OutputLengthSnafu { message }.build()
            }
            LoopError::MaxSteps { limit, .. } => loom_error::MaxStepsSnafu { limit }.build(),
            LoopError::Storage { message, .. } => loom_error::StorageSnafu { message }.build(),
            LoopError::AlreadyProcessing { session_id, .. } => loom_error::AbortedSnafu {
                reason: format!("a run is already in progress for session {session_id}"),
            }
            .build(),
            LoopError::Subagent { message, .. } => loom_error::AbortedSnafu { reason: message }.build(),
        }
    }
}

impl From<loom_subagent::SubagentError> for LoopError {
    fn from(err: loom_subagent::SubagentError) -> Self {
        SubagentSnafu {
            message: err.to_string(),
        }
        .build()
    }
}

pub type Result<T, E = LoopError> = std::result::Result<T, E>;
