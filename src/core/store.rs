//! In-memory conversation store
//!
//! Owns all conversation state. Mutations on one session go through that
//! session's mutex, so appends on the same session are totally ordered while
//! distinct sessions never contend.

use crate::core::errors::StoreError;
use crate::core::types::{Conversation, Message};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
pub struct ConversationStore {
    sessions: DashMap<String, Arc<Mutex<Conversation>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session and return its id
    pub fn create(&self, user_id: &str, assistant_id: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        let conversation = Conversation::new(&session_id, user_id, assistant_id);
        self.sessions
            .insert(session_id.clone(), Arc::new(Mutex::new(conversation)));
        tracing::debug!(%session_id, user_id, assistant_id, "Created session");
        session_id
    }

    /// Snapshot of the conversation
    pub fn get(&self, session_id: &str) -> Result<Conversation, StoreError> {
        self.with_session(session_id, |conversation| conversation.clone())
    }

    /// Append one message
    pub fn append(&self, session_id: &str, message: Message) -> Result<(), StoreError> {
        self.with_session(session_id, |conversation| {
            conversation.messages.push(message);
            conversation.updated_at = Utc::now();
        })
    }

    /// Append a completed turn's user and assistant messages in one critical
    /// section, so a concurrent reader observes either none or both
    pub fn append_turn(
        &self,
        session_id: &str,
        user_message: Message,
        assistant_message: Message,
    ) -> Result<(), StoreError> {
        self.with_session(session_id, |conversation| {
            conversation.messages.push(user_message);
            conversation.messages.push(assistant_message);
            conversation.updated_at = Utc::now();
        })
    }

    /// Replace the attached-file excerpt
    pub fn set_excerpt(&self, session_id: &str, excerpt: String) -> Result<(), StoreError> {
        self.with_session(session_id, |conversation| {
            conversation.attached_excerpt = Some(excerpt);
            conversation.updated_at = Utc::now();
        })
    }

    /// End a session explicitly, dropping its state
    pub fn end(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions
            .remove(session_id)
            .map(|_| tracing::debug!(%session_id, "Ended session"))
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Conversation) -> T,
    ) -> Result<T, StoreError> {
        let entry = self
            .sessions
            .get(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        // Release the map shard before taking the session lock.
        let slot = Arc::clone(entry.value());
        drop(entry);

        let mut conversation = slot
            .lock()
            .map_err(|_| StoreError::Poisoned(session_id.to_string()))?;
        Ok(f(&mut conversation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use std::sync::Arc;

    #[test]
    fn test_create_and_get() {
        let store = ConversationStore::new();
        let session_id = store.create("u1", "vet-general");

        let conversation = store.get(&session_id).unwrap();
        assert_eq!(conversation.user_id, "u1");
        assert_eq!(conversation.assistant_id, "vet-general");
        assert_eq!(conversation.message_count(), 0);
    }

    #[test]
    fn test_get_unknown_session() {
        let store = ConversationStore::new();
        let err = store.get("no-such-session").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_append_preserves_order() {
        let store = ConversationStore::new();
        let session_id = store.create("u1", "vet-general");

        for i in 0..5 {
            store
                .append(&session_id, Message::user(format!("msg {i}"), 1))
                .unwrap();
        }

        let conversation = store.get(&session_id).unwrap();
        let contents: Vec<&str> = conversation
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn test_append_turn_keeps_pair_adjacent() {
        let store = ConversationStore::new();
        let session_id = store.create("u1", "vet-general");

        store
            .append_turn(
                &session_id,
                Message::user("My dog is limping", 10),
                Message::assistant("Check the paw pads.", 5),
            )
            .unwrap();

        let conversation = store.get(&session_id).unwrap();
        assert_eq!(conversation.message_count(), 2);
        assert_eq!(conversation.messages[0].role, Role::User);
        assert_eq!(conversation.messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_set_excerpt_replaces() {
        let store = ConversationStore::new();
        let session_id = store.create("u1", "vet-general");

        store.set_excerpt(&session_id, "first".to_string()).unwrap();
        store.set_excerpt(&session_id, "second".to_string()).unwrap();

        let conversation = store.get(&session_id).unwrap();
        assert_eq!(conversation.attached_excerpt.as_deref(), Some("second"));
    }

    #[test]
    fn test_end_session() {
        let store = ConversationStore::new();
        let session_id = store.create("u1", "vet-general");
        assert_eq!(store.session_count(), 1);

        store.end(&session_id).unwrap();
        assert_eq!(store.session_count(), 0);
        assert!(matches!(
            store.get(&session_id),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.end(&session_id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_appends_serialize() {
        let store = Arc::new(ConversationStore::new());
        let session_id = store.create("u1", "vet-general");

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            let session_id = session_id.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    store
                        .append_turn(
                            &session_id,
                            Message::user("q", 1),
                            Message::assistant("a", 1),
                        )
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let conversation = store.get(&session_id).unwrap();
        assert_eq!(conversation.message_count(), 800);
        // Pairs stay adjacent under contention.
        for pair in conversation.messages.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }
}
