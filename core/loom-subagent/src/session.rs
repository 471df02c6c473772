use loom_protocol::Message;
use loom_protocol::Part;
use loom_protocol::Role;
use loom_protocol::Session;

/// How many Task spawns deep a chain of subagents may run before the
/// dispatcher refuses to spawn further, regardless of which agent is
/// named. Depth isn't stored on [`Session`] itself — the caller (the
/// dispatcher in `loom-loop`) tracks it alongside its own recursion and
/// compares against this constant.
pub const MAX_SPAWN_DEPTH: u32 = 4;

/// A freshly created child session plus the seeded first user message,
/// ready to hand to the processing loop.
pub struct ChildSessionSeed {
    pub session: Session,
    pub seed_message: Message,
}

/// Creates a child session under `parent` and seeds it with `prompt` as
/// the first user message, exactly as the Task Dispatcher's step 2/3
/// require before recursing into the processing loop.
pub fn seed_child_session(parent: &Session, prompt: impl Into<String>) -> ChildSessionSeed {
    let session = Session::child_of(parent);
    let seed_message = Message::new(session.id, Role::User, vec![Part::text(prompt)]);
    ChildSessionSeed {
        session,
        seed_message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_child_session_sets_parent_and_seeds_prompt() {
        let parent = Session::new("/work/repo");
        let seed = seed_child_session(&parent, "investigate the auth flow");
        assert_eq!(seed.session.parent_id, Some(parent.id));
        assert_eq!(seed.seed_message.session_id, seed.session.id);
        match &seed.seed_message.parts[0] {
            Part::Text { text } => assert_eq!(text, "investigate the auth flow"),
            other => panic!("expected Part::Text, got {other:?}"),
        }
    }
}
