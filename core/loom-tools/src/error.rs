use snafu::Location;
use snafu::Snafu;
use ulid::Ulid;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExecutorError {
    #[snafu(display("Tool not found: {name}"))]
    ToolNotFound {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("tool call rejected: {reason}"))]
    Rejected {
        session_id: Ulid,
        call_id: String,
        tool_name: String,
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T, E = ExecutorError> = std::result::Result<T, E>;
