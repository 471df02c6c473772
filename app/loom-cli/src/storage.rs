use async_trait::async_trait;
use loom_loop::Storage;
use loom_protocol::Message;
use loom_protocol::Session;
use std::collections::HashMap;
use std::sync::Mutex;
use ulid::Ulid;

/// Keeps every session and message in process memory. Good enough for the
/// demonstration binary; a real deployment swaps this for the keyed
/// hierarchical store described in the specification's external
/// interfaces section.
#[derive(Default)]
pub struct InMemoryStorage {
    sessions: Mutex<HashMap<Ulid, Session>>,
    messages: Mutex<HashMap<Ulid, Vec<Message>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn load_session(&self, id: Ulid) -> loom_error::Result<Option<Session>> {
        Ok(self.sessions.lock().unwrap_or_else(|e| e.into_inner()).get(&id).cloned())
    }

    async fn save_session(&self, session: &Session) -> loom_error::Result<()> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn load_messages(&self, session_id: Ulid) -> loom_error::Result<Vec<Message>> {
        Ok(self
            .messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_message(&self, message: &Message) -> loom_error::Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(message.session_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn update_message(&self, message: &Message) -> loom_error::Result<()> {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = messages.entry(message.session_id).or_default();
        match bucket.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None => bucket.push(message.clone()),
        }
        Ok(())
    }
}
