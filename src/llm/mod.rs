//! Upstream LLM provider boundary
//!
//! The engine talks to the provider through [`ChatProvider`] only. Providers
//! are opaque, rate-limited and fallible; the engine never retries internally.

mod error;
mod openai;
mod types;

pub use error::ProviderError;
pub use openai::OpenAiProvider;
pub use types::{ChatMessage, ProviderReply, Role, TokenUsage};

use crate::config::ProviderConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for upstream chat providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Send the assembled prompt and return the assistant reply
    ///
    /// One call per turn. The reply carries the provider's billed usage when
    /// the upstream reports it.
    async fn complete(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
    ) -> Result<ProviderReply, ProviderError>;
}

/// Create a chat provider from validated configuration
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn ChatProvider>> {
    match config.kind.to_lowercase().as_str() {
        "openai" => {
            let mut provider = match &config.api_key {
                Some(key) => OpenAiProvider::new(key.clone()),
                None => OpenAiProvider::from_env()?,
            };
            provider = provider
                .with_base_url(&config.base_url)
                .with_timeout(Duration::from_secs(config.timeout_secs));
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("Unknown provider kind: {}. Supported: openai", other),
    }
}
