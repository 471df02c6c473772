use snafu::Location;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum McpError {
    #[snafu(display("failed to start transport for server {server}: {message}"))]
    Transport {
        server: String,
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("server {server} reported protocol version {reported}, expected {expected}"))]
    ProtocolMismatch {
        server: String,
        reported: String,
        expected: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("server {server} is not connected"))]
    NotConnected {
        server: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("tool {tool} not found on server {server}"))]
    ToolNotFound {
        server: String,
        tool: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("call to {server}/{tool} failed: {message}"))]
    CallFailed {
        server: String,
        tool: String,
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T, E = McpError> = std::result::Result<T, E>;
