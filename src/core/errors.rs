//! Domain error types
//!
//! One enum per component, aggregated into [`TurnError`] at the engine
//! boundary. `TurnError::kind` gives transport layers a stable string for
//! their error responses.

use crate::llm::ProviderError;
use thiserror::Error;

/// Errors from the assistant registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Unknown assistant id
    #[error("Unknown assistant: {0}")]
    NotFound(String),
}

/// Errors from token counting
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// Model family is not recognized; a configuration defect caught at
    /// startup validation
    #[error("Unsupported model family: {0}")]
    UnsupportedModel(String),
}

/// Errors from file ingestion
#[derive(Debug, Error)]
pub enum IngestError {
    /// Mime type the ingestor cannot decode
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Upload bytes could not be decoded
    #[error("File ingestion failed: {0}")]
    Corrupt(String),
}

/// Errors from the conversation store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unknown or already-ended session
    #[error("Session not found: {0}")]
    NotFound(String),

    /// A writer panicked while holding the session lock
    #[error("Session state corrupted: {0}")]
    Poisoned(String),
}

/// A failed turn, reported to the caller as an error kind plus message
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// File supplied for an assistant configured without file support
    #[error("Assistant {assistant_id} does not accept file attachments")]
    AttachmentRejected { assistant_id: String },

    /// Session exists but belongs to a different user or assistant
    #[error("Session {session_id} does not match this user and assistant")]
    SessionMismatch { session_id: String },
}

impl TurnError {
    /// Stable machine-readable kind for transport error mapping
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::Registry(RegistryError::NotFound(_)) => "not_found",
            TurnError::Store(StoreError::NotFound(_)) => "not_found",
            TurnError::Store(StoreError::Poisoned(_)) => "concurrency",
            TurnError::Tokenizer(_) => "unsupported_model",
            TurnError::Ingest(IngestError::UnsupportedFormat(_)) => "unsupported_format",
            TurnError::Ingest(IngestError::Corrupt(_)) => "ingestion",
            TurnError::Provider(_) => "provider",
            TurnError::AttachmentRejected { .. } => "attachment_rejected",
            TurnError::SessionMismatch { .. } => "not_found",
        }
    }

    /// Whether the caller can correct this failure (as opposed to retrying)
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            TurnError::Provider(_) | TurnError::Store(StoreError::Poisoned(_))
        )
    }
}
