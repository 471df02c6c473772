use crate::traits::EventBus;
use async_trait::async_trait;
use loom_protocol::ApprovalRequest;
use loom_protocol::LoopEvent;
use loom_tools_api::PermissionDecision;
use loom_tools_api::PermissionGate;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::oneshot;
use ulid::Ulid;
use tracing::warn;

/// The Permission Gate's concrete implementation: publishes
/// `LoopEvent::PermissionRequested` on the event bus and blocks the
/// calling tool on a `oneshot` channel until whatever answers on the
/// user's behalf (CLI prompt, IDE dialog, test harness) calls
/// [`EventBusPermissionGate::resolve`] with a decision. A request whose
/// answerer disappears (dropped sender, process exit) resolves to
/// `Denied` rather than hanging forever.
pub struct EventBusPermissionGate {
    bus: Arc<dyn EventBus>,
    pending: Mutex<HashMap<String, oneshot::Sender<PermissionDecision>>>,
}

impl EventBusPermissionGate {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        EventBusPermissionGate {
            bus,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Delivers a decision for an outstanding request. A request id with
    /// no matching waiter (already resolved, already timed out, or never
    /// issued) is silently ignored.
    pub fn resolve(&self, request_id: &str, decision: PermissionDecision) {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(request_id);
        if let Some(sender) = sender {
            let _ = sender.send(decision);
        }
    }
}

#[async_trait]
impl PermissionGate for EventBusPermissionGate {
    async fn ask(&self, session_id: Ulid, request: ApprovalRequest) -> PermissionDecision {
        let request_id = request.request_id.clone();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request_id.clone(), tx);

        self.bus.publish(LoopEvent::PermissionRequested {
            session_id,
            request,
        });

        match rx.await {
            Ok(decision) => decision,
            Err(_) => {
                warn!(request_id, "permission request dropped without a decision");
                self.pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&request_id);
                PermissionDecision::Denied
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingBus {
        events: StdMutex<Vec<LoopEvent>>,
    }

    impl EventBus for RecordingBus {
        fn publish(&self, event: LoopEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn resolve_unblocks_a_pending_ask() {
        let bus = Arc::new(RecordingBus {
            events: StdMutex::new(Vec::new()),
        });
        let gate = Arc::new(EventBusPermissionGate::new(bus.clone()));
        let request = ApprovalRequest {
            request_id: "req-1".to_string(),
            tool_name: "Bash".to_string(),
            description: "rm -rf build".to_string(),
            risks: Vec::new(),
            allow_remember: false,
        };

        let gate_clone = gate.clone();
        let ask = tokio::spawn(async move { gate_clone.ask(Ulid::new(), request).await });

        // Give the spawned task a chance to register before resolving.
        tokio::task::yield_now().await;
        gate.resolve("req-1", PermissionDecision::Approved);

        let decision = ask.await.unwrap();
        assert_eq!(decision, PermissionDecision::Approved);
        assert_eq!(bus.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn vanished_answerer_denies_the_pending_ask() {
        let bus = Arc::new(RecordingBus {
            events: StdMutex::new(Vec::new()),
        });
        let gate = Arc::new(EventBusPermissionGate::new(bus));
        let request = ApprovalRequest {
            request_id: "req-2".to_string(),
            tool_name: "Bash".to_string(),
            description: "ls".to_string(),
            risks: Vec::new(),
            allow_remember: false,
        };

        let gate_clone = gate.clone();
        let ask = tokio::spawn(async move { gate_clone.ask(Ulid::new(), request).await });
        tokio::task::yield_now().await;

        // Simulate the answerer vanishing without ever deciding: drop its
        // sender directly rather than calling `resolve`.
        gate.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove("req-2");

        let decision = ask.await.unwrap();
        assert_eq!(decision, PermissionDecision::Denied);
    }
}
