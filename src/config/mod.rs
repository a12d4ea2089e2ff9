//! Configuration management for vetchat
//!
//! Assistant definitions and provider settings are supplied at process start
//! and treated as already-validated input once `validate` has passed. Nothing
//! here is mutable at runtime.

use crate::core::tokenizer::TokenCounter;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub limits: LimitsConfig,
    pub assistants: Vec<AssistantConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider dialect, currently only "openai"
    pub kind: String,
    pub base_url: String,
    /// Credential; falls back to the provider's environment variable when unset
    pub api_key: Option<String>,
    /// Bounded wait for one upstream call, in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Cap on the excerpt extracted from an uploaded file, in characters
    pub max_excerpt_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_excerpt_chars: 4000,
        }
    }
}

/// A preconfigured conversational assistant
///
/// Immutable after load; identified by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub id: String,
    pub display_name: String,
    pub model_id: String,
    pub system_prompt: String,
    #[serde(default)]
    pub accepts_files: bool,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse config")
    }

    /// Validate the configuration at startup
    ///
    /// An assistant whose model family the token counter does not recognize is
    /// a configuration defect and fails here rather than at request time.
    pub fn validate(&self, counter: &dyn TokenCounter) -> Result<()> {
        if self.assistants.is_empty() {
            bail!("No assistants configured");
        }
        if self.limits.max_excerpt_chars == 0 {
            bail!("limits.max_excerpt_chars must be greater than zero");
        }

        let mut seen = HashSet::new();
        for assistant in &self.assistants {
            if assistant.id.is_empty() {
                bail!("Assistant with empty id");
            }
            if !seen.insert(assistant.id.as_str()) {
                bail!("Duplicate assistant id: {}", assistant.id);
            }
            counter.supports(&assistant.model_id).with_context(|| {
                format!(
                    "Assistant {} uses unsupported model {}",
                    assistant.id, assistant.model_id
                )
            })?;
        }

        tracing::info!(
            assistants = self.assistants.len(),
            provider = %self.provider.kind,
            "Configuration validated"
        );
        Ok(())
    }
}
