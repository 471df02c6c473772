use loom_protocol::ApprovalRequest;
use loom_protocol::CategoryPermissions;
use loom_protocol::PermissionMode;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use ulid::Ulid;

/// What the Edit/Write tools recorded the last time a file was read,
/// used for the staleness check ("has this file changed on disk since
/// we last looked at it") before applying an edit.
#[derive(Debug, Clone)]
pub struct FileReadState {
    pub content_hash: Option<[u8; 32]>,
    pub read_at: std::time::SystemTime,
}

impl FileReadState {
    pub fn complete(content: String, mtime: Option<std::time::SystemTime>) -> Self {
        FileReadState {
            content_hash: Some(Self::compute_hash(&content)),
            read_at: mtime.unwrap_or_else(std::time::SystemTime::now),
        }
    }

    pub fn compute_hash(content: &str) -> [u8; 32] {
        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        hasher.update(content.as_bytes());
        hasher.finalize().into()
    }
}

/// Per-call execution context a [`crate::Tool`] runs with. One instance
/// is created per tool call by the Tool Executor; `file_read_state` and
/// `cwd` are shared (via the session-scoped `Arc<Mutex<_>>` fields) so
/// that sequential calls within the same turn observe each other's
/// effects.
pub struct ToolContext {
    pub session_id: Ulid,
    pub call_id: String,
    pub cwd: PathBuf,
    pub permission_mode: PermissionMode,
    pub is_plan_mode: bool,
    pub plan_file_path: Option<PathBuf>,
    /// Per-category permission policy for the agent running this call;
    /// consulted by the Tool Executor before it falls back to a tool's
    /// own `check_permission`.
    pub category_permissions: CategoryPermissions,
    progress_tx: Option<mpsc::Sender<String>>,
    file_read_state: Arc<Mutex<HashMap<PathBuf, FileReadState>>>,
    subagent_spawner: Option<Arc<dyn crate::SubagentSpawner>>,
    permission_gate: Option<Arc<dyn crate::PermissionGate>>,
}

impl ToolContext {
    pub fn new(session_id: Ulid, call_id: impl Into<String>, cwd: PathBuf) -> Self {
        ToolContext {
            session_id,
            call_id: call_id.into(),
            cwd,
            permission_mode: PermissionMode::Default,
            is_plan_mode: false,
            plan_file_path: None,
            category_permissions: CategoryPermissions::default(),
            progress_tx: None,
            file_read_state: Arc::new(Mutex::new(HashMap::new())),
            subagent_spawner: None,
            permission_gate: None,
        }
    }

    pub fn with_subagent_spawner(mut self, spawner: Arc<dyn crate::SubagentSpawner>) -> Self {
        self.subagent_spawner = Some(spawner);
        self
    }

    pub fn with_permission_gate(mut self, gate: Arc<dyn crate::PermissionGate>) -> Self {
        self.permission_gate = Some(gate);
        self
    }

    pub fn with_category_permissions(mut self, permissions: CategoryPermissions) -> Self {
        self.category_permissions = permissions;
        self
    }

    /// Blocks until the Permission Gate answers, or fails closed
    /// (`Denied`) if this context has no gate configured.
    pub async fn ask_permission(&self, request: ApprovalRequest) -> crate::PermissionDecision {
        match &self.permission_gate {
            Some(gate) => gate.ask(self.session_id, request).await,
            None => crate::PermissionDecision::Denied,
        }
    }

    pub fn can_spawn_agent(&self) -> bool {
        self.subagent_spawner.is_some()
    }

    pub async fn spawn_agent(
        &self,
        input: crate::SpawnAgentInput,
    ) -> crate::error::Result<crate::SpawnAgentResult> {
        match &self.subagent_spawner {
            Some(spawner) => spawner.spawn(input).await,
            None => Err(crate::error::ExecutionFailedSnafu {
                message: "no subagent spawner configured for this context",
            }
            .build()),
        }
    }

    pub fn with_progress_sender(mut self, tx: mpsc::Sender<String>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn with_shared_read_state(
        mut self,
        state: Arc<Mutex<HashMap<PathBuf, FileReadState>>>,
    ) -> Self {
        self.file_read_state = state;
        self
    }

    pub fn shared_read_state(&self) -> Arc<Mutex<HashMap<PathBuf, FileReadState>>> {
        self.file_read_state.clone()
    }

    /// Resolve a possibly-relative tool-supplied path against `cwd`.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.cwd.join(candidate)
        }
    }

    pub async fn emit_progress(&self, message: impl Into<String>) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(message.into()).await;
        }
    }

    pub async fn was_file_read(&self, path: &Path) -> bool {
        self.file_read_state.lock().await.contains_key(path)
    }

    pub async fn file_read_state(&self, path: &Path) -> Option<FileReadState> {
        self.file_read_state.lock().await.get(path).cloned()
    }

    pub async fn record_file_read_with_state(&self, path: &Path, state: FileReadState) {
        self.file_read_state
            .lock()
            .await
            .insert(path.to_path_buf(), state);
    }

    pub async fn record_file_modified(&self, path: &Path) {
        self.file_read_state.lock().await.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_path_joins_relative_paths_to_cwd() {
        let ctx = ToolContext::new(Ulid::new(), "call-1", PathBuf::from("/work"));
        assert_eq!(ctx.resolve_path("src/main.rs"), PathBuf::from("/work/src/main.rs"));
        assert_eq!(ctx.resolve_path("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[tokio::test]
    async fn file_read_tracking_round_trips() {
        let ctx = ToolContext::new(Ulid::new(), "call-1", PathBuf::from("/work"));
        let path = PathBuf::from("/work/a.txt");
        assert!(!ctx.was_file_read(&path).await);
        ctx.record_file_read_with_state(&path, FileReadState::complete("hi".into(), None))
            .await;
        assert!(ctx.was_file_read(&path).await);
        ctx.record_file_modified(&path).await;
        assert!(!ctx.was_file_read(&path).await);
    }
}
