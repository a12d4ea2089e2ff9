//! Conversation engine
//!
//! Orchestrates one turn: assemble the prompt, call the upstream provider,
//! record the turn and account its tokens. A turn moves through
//! Preparing -> Prompting -> Completed | Failed. Nothing is written to the
//! message history or the ledger until the provider call has succeeded, so a
//! failed or cancelled turn leaves both exactly as they were.

use crate::config::{AssistantConfig, Config};
use crate::core::errors::TurnError;
use crate::core::ingest::FileIngestor;
use crate::core::ledger::UsageLedger;
use crate::core::registry::AssistantRegistry;
use crate::core::store::ConversationStore;
use crate::core::tokenizer::TokenCounter;
use crate::core::types::{Message, TurnReceipt};
use crate::llm::{ChatMessage, ChatProvider, ProviderError, Role};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Turn lifecycle, reported in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Preparing,
    Prompting,
    Completed,
    Failed,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparing => "Preparing",
            Self::Prompting => "Prompting",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bounded wait for one upstream call
    pub provider_timeout: Duration,
    /// Cap applied to uploaded-file excerpts
    pub max_excerpt_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            max_excerpt_chars: 4000,
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider_timeout: Duration::from_secs(config.provider.timeout_secs),
            max_excerpt_chars: config.limits.max_excerpt_chars,
        }
    }
}

/// A file uploaded with a turn
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// One user-message-in request
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub user_id: String,
    pub assistant_id: String,
    /// Continue an existing session, or `None` to start a new one
    pub session_id: Option<String>,
    pub message: String,
    pub upload: Option<Upload>,
}

/// Orchestrates turns across the registry, store, ledger, counter and the
/// upstream provider
pub struct ConversationEngine {
    registry: Arc<AssistantRegistry>,
    store: Arc<ConversationStore>,
    ledger: Arc<UsageLedger>,
    counter: Arc<dyn TokenCounter>,
    provider: Arc<dyn ChatProvider>,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn new(
        registry: Arc<AssistantRegistry>,
        store: Arc<ConversationStore>,
        ledger: Arc<UsageLedger>,
        counter: Arc<dyn TokenCounter>,
        provider: Arc<dyn ChatProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            store,
            ledger,
            counter,
            provider,
            config,
        }
    }

    pub fn registry(&self) -> &AssistantRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Configured assistants in stable order
    pub fn list_assistants(&self) -> &[AssistantConfig] {
        self.registry.list()
    }

    /// Usage totals for one user across all assistants
    pub fn usage_for(&self, user_id: &str) -> HashMap<String, u64> {
        self.ledger.get_all(user_id)
    }

    /// End a session explicitly
    pub fn end_session(&self, session_id: &str) -> Result<(), TurnError> {
        Ok(self.store.end(session_id)?)
    }

    /// Run one turn to completion
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnReceipt, TurnError> {
        let result = self.drive_turn(&request).await;
        match &result {
            Ok(receipt) => tracing::info!(
                session_id = %receipt.session_id,
                state = TurnState::Completed.as_str(),
                turn_tokens = receipt.turn_tokens,
                total_tokens = receipt.total_tokens,
                estimated = receipt.estimated,
                "Turn completed"
            ),
            Err(err) => tracing::warn!(
                user_id = %request.user_id,
                assistant_id = %request.assistant_id,
                state = TurnState::Failed.as_str(),
                kind = err.kind(),
                error = %err,
                "Turn failed"
            ),
        }
        result
    }

    async fn drive_turn(&self, request: &TurnRequest) -> Result<TurnReceipt, TurnError> {
        tracing::debug!(
            user_id = %request.user_id,
            assistant_id = %request.assistant_id,
            state = TurnState::Preparing.as_str(),
            "Turn started"
        );

        let assistant = self.registry.get(&request.assistant_id)?.clone();

        let session_id = match &request.session_id {
            Some(id) => {
                let conversation = self.store.get(id)?;
                if conversation.user_id != request.user_id
                    || conversation.assistant_id != request.assistant_id
                {
                    return Err(TurnError::SessionMismatch {
                        session_id: id.clone(),
                    });
                }
                id.clone()
            }
            None => self.store.create(&request.user_id, &request.assistant_id),
        };

        if let Some(upload) = &request.upload {
            if !assistant.accepts_files {
                return Err(TurnError::AttachmentRejected {
                    assistant_id: assistant.id.clone(),
                });
            }
            let excerpt = FileIngestor::ingest(
                &upload.bytes,
                &upload.mime_type,
                self.config.max_excerpt_chars,
            )?;
            tracing::debug!(
                session_id = %session_id,
                filename = %upload.filename,
                format = ?excerpt.format,
                truncated = excerpt.truncated,
                source_chars = excerpt.source_chars,
                "Ingested upload"
            );
            self.store.set_excerpt(&session_id, excerpt.text)?;
        }

        let conversation = self.store.get(&session_id)?;
        let mut prompt: Vec<ChatMessage> = Vec::with_capacity(conversation.messages.len() + 3);
        prompt.push(ChatMessage::system(&assistant.system_prompt));
        if let Some(excerpt) = &conversation.attached_excerpt {
            prompt.push(ChatMessage::system(format!(
                "Attached file content:\n{excerpt}"
            )));
        }
        prompt.extend(conversation.messages.iter().map(Message::to_chat));
        prompt.push(ChatMessage::user(&request.message));

        tracing::debug!(
            session_id = %session_id,
            state = TurnState::Prompting.as_str(),
            model = %assistant.model_id,
            prompt_messages = prompt.len(),
            "Calling provider"
        );
        let reply = match tokio::time::timeout(
            self.config.provider_timeout,
            self.provider.complete(&assistant.model_id, &prompt),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                return Err(ProviderError::Timeout {
                    elapsed_secs: self.config.provider_timeout.as_secs(),
                }
                .into())
            }
        };

        // Provider-reported usage is what gets billed; fall back to the
        // local counter otherwise and flag the receipt as an estimate.
        let (prompt_tokens, reply_tokens, estimated) = match reply.usage {
            Some(usage) => (
                u64::from(usage.input_tokens),
                u64::from(usage.output_tokens),
                false,
            ),
            None => (
                self.counter.count_messages(&assistant.model_id, &prompt)?,
                self.counter.count(&assistant.model_id, &reply.text)?,
                true,
            ),
        };

        let user_message = Message::new(Role::User, request.message.clone(), prompt_tokens);
        let assistant_message = Message::new(Role::Assistant, reply.text.clone(), reply_tokens);

        // History first, ledger second: a crash in between undercounts usage
        // but never records a partial increment.
        self.store
            .append_turn(&session_id, user_message, assistant_message)?;
        let turn_tokens = prompt_tokens + reply_tokens;
        let total_tokens = self
            .ledger
            .add(&request.user_id, &request.assistant_id, turn_tokens);

        Ok(TurnReceipt {
            session_id,
            reply_text: reply.text,
            turn_tokens,
            total_tokens,
            estimated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::BillingTokenCounter;
    use crate::llm::ProviderReply;
    use async_trait::async_trait;

    struct StaticProvider {
        reply: String,
    }

    #[async_trait]
    impl ChatProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        async fn complete(
            &self,
            _model_id: &str,
            _messages: &[ChatMessage],
        ) -> Result<ProviderReply, ProviderError> {
            Ok(ProviderReply::text(self.reply.clone()))
        }
    }

    fn assistant(id: &str, accepts_files: bool) -> AssistantConfig {
        AssistantConfig {
            id: id.to_string(),
            display_name: id.to_string(),
            model_id: "gpt-3.5-turbo".to_string(),
            system_prompt: "You are a vet.".to_string(),
            accepts_files,
        }
    }

    fn engine(assistants: Vec<AssistantConfig>) -> ConversationEngine {
        ConversationEngine::new(
            Arc::new(AssistantRegistry::new(assistants)),
            Arc::new(ConversationStore::new()),
            Arc::new(UsageLedger::new()),
            Arc::new(BillingTokenCounter::new()),
            Arc::new(StaticProvider {
                reply: "Check the paw pads.".to_string(),
            }),
            EngineConfig::default(),
        )
    }

    fn turn(user: &str, assistant: &str, session: Option<String>) -> TurnRequest {
        TurnRequest {
            user_id: user.to_string(),
            assistant_id: assistant.to_string(),
            session_id: session,
            message: "My dog is limping".to_string(),
            upload: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_assistant_is_not_found() {
        let engine = engine(vec![assistant("vet-general", false)]);
        let err = engine
            .run_turn(turn("u1", "vet-dentist", None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(engine.store().session_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let engine = engine(vec![assistant("vet-general", false)]);
        let err = engine
            .run_turn(turn("u1", "vet-general", Some("ghost".to_string())))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_session_of_other_user_is_rejected() {
        let engine = engine(vec![assistant("vet-general", false)]);
        let receipt = engine.run_turn(turn("u1", "vet-general", None)).await.unwrap();

        let err = engine
            .run_turn(turn("u2", "vet-general", Some(receipt.session_id)))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::SessionMismatch { .. }));
        // The intruding turn left no trace.
        assert_eq!(engine.ledger().get("u2", "vet-general"), 0);
    }

    #[tokio::test]
    async fn test_upload_rejected_without_file_support() {
        let engine = engine(vec![assistant("vet-general", false)]);
        let mut request = turn("u1", "vet-general", None);
        request.upload = Some(Upload {
            filename: "record.txt".to_string(),
            mime_type: "text/plain".to_string(),
            bytes: b"vaccination record".to_vec(),
        });

        let err = engine.run_turn(request).await.unwrap_err();
        assert!(matches!(err, TurnError::AttachmentRejected { .. }));
        assert_eq!(engine.ledger().get("u1", "vet-general"), 0);
    }

    #[tokio::test]
    async fn test_turn_state_labels() {
        assert_eq!(TurnState::Preparing.as_str(), "Preparing");
        assert_eq!(TurnState::Failed.as_str(), "Failed");
    }
}
