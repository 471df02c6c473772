use snafu::Location;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ContextError {
    #[snafu(display("failed to build context: {message}"))]
    Build {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T, E = ContextError> = std::result::Result<T, E>;
