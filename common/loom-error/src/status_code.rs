/// gRPC-style status classification, used to map internal errors onto a
/// small, stable vocabulary that external callers (HTTP layer, CLI exit
/// codes) can switch on without depending on crate-specific error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StatusCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Unavailable,
    Internal,
}

impl StatusCode {
    /// Whether a caller should expect retrying the same operation to help.
    pub fn is_retryable(self) -> bool {
        matches!(self, StatusCode::Unavailable | StatusCode::ResourceExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_retryable() {
        assert!(StatusCode::Unavailable.is_retryable());
        assert!(!StatusCode::InvalidArgument.is_retryable());
    }
}
