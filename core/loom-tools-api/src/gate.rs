use async_trait::async_trait;
use loom_protocol::ApprovalRequest;
use ulid::Ulid;

/// Outcome of asking the Permission Gate for a decision on one call.
/// `ApprovedRemember` additionally asks the caller to persist a rule so
/// equivalent future calls skip the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Approved,
    ApprovedRemember,
    Denied,
}

/// The Permission Gate: the single place a tool call that isn't
/// pre-decided by policy blocks for an external answer. Implemented in
/// `loom-loop` (the only crate that owns the event bus a decision is
/// published on and resolved through); kept as a trait here so
/// `loom-tools`'s executor and built-in tools can depend on it without
/// depending on `loom-loop`.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Publishes the request and waits for a decision, or for `ctx`'s
    /// session to be cancelled. Implementations must fail closed
    /// (`Denied`) if no decision ever arrives.
    async fn ask(&self, session_id: Ulid, request: ApprovalRequest) -> PermissionDecision;
}
