//! vetchat: session and accounting engine for a multi-assistant chat backend
//!
//! This library lets a caller pick among preconfigured conversational
//! assistants, exchange messages with an upstream language-model provider,
//! attach uploaded files as conversation context, and track per-user token
//! consumption for cost accounting. It provides:
//!
//! - a static [`AssistantRegistry`] built from configuration at startup
//! - an append-only [`ConversationStore`] with per-session serialization
//! - a race-free [`UsageLedger`] of tokens per (user, assistant) pair
//! - deterministic token counting tied to model identifiers
//! - bounded plain-text excerpts from uploaded files
//! - the [`ConversationEngine`] that drives one turn end to end
//!
//! The HTTP transport, request schemas and process bootstrap live outside
//! this crate and consume the API re-exported below.

pub mod config;
pub mod core;
pub mod llm;

pub use config::{AssistantConfig, Config};
pub use core::engine::{ConversationEngine, EngineConfig, TurnRequest, Upload};
pub use core::errors::TurnError;
pub use core::ledger::UsageLedger;
pub use core::registry::AssistantRegistry;
pub use core::store::ConversationStore;
pub use core::tokenizer::{BillingTokenCounter, TokenCounter};
pub use core::types::{Conversation, Message, TurnReceipt};
pub use llm::{create_provider, ChatProvider};
