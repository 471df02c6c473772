use crate::Part;
use serde::Deserialize;
use serde::Serialize;
use ulid::Ulid;

/// Observer events published on the processor's non-blocking event
/// channel while a turn runs. The processor never awaits a subscriber;
/// a full channel drops the oldest event rather than stalling the loop
/// (see `loom_loop::Processor::publish`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    StepStarted {
        session_id: Ulid,
        message_id: Ulid,
    },
    PartUpdated {
        session_id: Ulid,
        message_id: Ulid,
        part: Part,
    },
    ToolProgress {
        session_id: Ulid,
        call_id: String,
        message: String,
    },
    PermissionRequested {
        session_id: Ulid,
        request: crate::ApprovalRequest,
    },
    StepFinished {
        session_id: Ulid,
        message_id: Ulid,
    },
    Compacted {
        session_id: Ulid,
        reason: crate::CompactionReason,
    },
    SessionDiff {
        session_id: Ulid,
        summary: crate::SessionSummary,
    },
    Error {
        session_id: Ulid,
        message: String,
    },
}
