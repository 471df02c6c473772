use crate::Part;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Added/deleted line counts for one file touched by a session's
/// Edit/Write calls, folded into [`Session::summary`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileDiffSummary {
    pub path: String,
    pub added: u32,
    pub deleted: u32,
}

/// Session-wide rollup of every file-mutating diff produced so far,
/// maintained by the Processor as Edit/Write tool calls complete. Distinct
/// from the per-call `Part::Tool.diff`, which carries only that one call's
/// unified diff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub added_lines: u32,
    pub deleted_lines: u32,
    pub files: Vec<FileDiffSummary>,
    pub share_url: Option<String>,
}

/// Marks that a prior message/part has been reverted and the session's
/// history truncated back to it; `part_index` is `None` when the whole
/// message (not just one part of it) was the revert target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRevert {
    pub message_id: Ulid,
    pub part_index: Option<usize>,
}

/// A persisted session. The session directory id used by the Storage
/// layer is derived separately (SHA-256 of the working directory,
/// truncated); `id` here is the session's own sortable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Ulid,
    pub cwd: String,
    pub title: Option<String>,
    /// Set for subagent sessions spawned by the Task Dispatcher.
    pub parent_id: Option<Ulid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub summary: SessionSummary,
    /// Set for the duration of an in-flight Tier-2 compaction.
    #[serde(default)]
    pub compacting: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revert: Option<SessionRevert>,
}

impl Session {
    pub fn new(cwd: impl Into<String>) -> Self {
        let now = Utc::now();
        Session {
            id: Ulid::new(),
            cwd: cwd.into(),
            title: None,
            parent_id: None,
            created_at: now,
            updated_at: now,
            summary: SessionSummary::default(),
            compacting: None,
            revert: None,
        }
    }

    pub fn child_of(parent: &Session) -> Self {
        let mut session = Session::new(parent.cwd.clone());
        session.parent_id = Some(parent.id);
        session
    }
}

/// A user-visible failure persisted on the [`Message`] that experienced it,
/// so a closed/reopened session still shows why a turn didn't finish
/// (rather than only a transient `LoopEvent::Error` that a disconnected
/// client would simply miss).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageError {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Ulid,
    pub session_id: Ulid,
    pub role: Role,
    pub parts: Vec<Part>,
    pub created_at: DateTime<Utc>,
    /// True for the synthetic assistant message a Tier-2 compaction
    /// writes in place of the summarized history.
    #[serde(default)]
    pub is_summary: bool,
    /// Set when the turn that produced this message failed (aborted, over
    /// the output-length cap, or ran out of steps) instead of finishing
    /// normally.
    #[serde(default)]
    pub error: Option<MessageError>,
}

impl Message {
    pub fn new(session_id: Ulid, role: Role, parts: Vec<Part>) -> Self {
        Message {
            id: Ulid::new(),
            session_id,
            role,
            parts,
            created_at: Utc::now(),
            is_summary: false,
            error: None,
        }
    }
}

/// A named agent profile: its base system prompt, the tool names it may
/// call, an optional model override, and the permission posture new
/// sessions using it should start with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub system_prompt: String,
    pub tools: Vec<String>,
    pub model: Option<String>,
    pub permission_mode: crate::PermissionMode,
    /// Tri-state policy per tool category (`bash`/`write`/`doom_loop`),
    /// orthogonal to `permission_mode`.
    #[serde(default)]
    pub category_permissions: crate::CategoryPermissions,
    /// Configured allow/deny/ask patterns consulted before a tool's own
    /// `check_permission`, e.g. `Bash(git status:*) -> allow`.
    #[serde(default)]
    pub permission_rules: Vec<crate::PermissionRuleSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_session_inherits_cwd_and_parent_id() {
        let parent = Session::new("/work/repo");
        let child = Session::child_of(&parent);
        assert_eq!(child.cwd, parent.cwd);
        assert_eq!(child.parent_id, Some(parent.id));
        assert_ne!(child.id, parent.id);
    }
}
