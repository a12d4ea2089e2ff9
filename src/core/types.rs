//! Canonical type definitions for the core domain

use crate::llm::{ChatMessage, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single message in a conversation
///
/// Immutable once created. `token_count` is computed exactly once, when the
/// message is appended, and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Tokens attributed to this message in the usage ledger. For a user
    /// message this is the billed cost of the whole assembled prompt; for an
    /// assistant message, the cost of the reply.
    pub token_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, token_count: u64) -> Self {
        Self {
            role,
            content: content.into(),
            token_count,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>, token_count: u64) -> Self {
        Self::new(Role::User, content, token_count)
    }

    pub fn assistant(content: impl Into<String>, token_count: u64) -> Self {
        Self::new(Role::Assistant, content, token_count)
    }

    /// Wire representation for the provider call
    pub fn to_chat(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// One continuous conversation between a user and one assistant
///
/// Owned exclusively by the store. `assistant_id` never changes after
/// creation; switching assistants starts a new session. History is
/// append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub session_id: String,
    pub user_id: String,
    pub assistant_id: String,
    pub messages: Vec<Message>,
    pub attached_excerpt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(session_id: &str, user_id: &str, assistant_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            assistant_id: assistant_id.to_string(),
            messages: Vec::new(),
            attached_excerpt: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Outcome of a completed turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnReceipt {
    pub session_id: String,
    pub reply_text: String,
    /// Tokens consumed by this turn (prompt plus reply)
    pub turn_tokens: u64,
    /// Running total for this (user, assistant) pair after the turn
    pub total_tokens: u64,
    /// True when the counts are a local estimate because the provider did
    /// not report billed usage
    pub estimated: bool,
}
