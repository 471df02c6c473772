use snafu::Location;
use snafu::Snafu;

/// Errors raised while resolving or seeding a subagent run. Distinct from
/// [`loom_error::Error`] because "which named agent" and "how deep is the
/// spawn chain" are concerns local to dispatch, not the processing loop
/// itself; the dispatcher (in `loom-loop`) converts these at its boundary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SubagentError {
    #[snafu(display("unknown agent type: {name}"))]
    AgentNotFound {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("agent {name} cannot be spawned via Task"))]
    NotSpawnable {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("maximum subagent spawn depth ({limit}) exceeded"))]
    MaxDepthExceeded {
        limit: u32,
        #[snafu(implicit)]
        location: Location,
    },
}

impl From<SubagentError> for loom_error::Error {
    fn from(err: SubagentError) -> Self {
        match err {
            SubagentError::AgentNotFound { name, .. } => {
                loom_error::ConfigSnafu {
                    message: format!("unknown agent type: {name}"),
                }
                .build()
            }
            SubagentError::NotSpawnable { name, .. } => {
                loom_error::ToolRejectedSnafu {
                    reason: format!("agent {name} cannot be spawned via Task"),
                }
                .build()
            }
            SubagentError::MaxDepthExceeded { limit, .. } => {
                loom_error::AbortedSnafu {
                    reason: format!("maximum subagent spawn depth ({limit}) exceeded"),
                }
                .build()
            }
        }
    }
}

pub type Result<T, E = SubagentError> = std::result::Result<T, E>;
