//! Static assistant registry
//!
//! Populated once at startup from validated configuration and read-only
//! afterwards. `list` preserves the configured order.

use crate::config::AssistantConfig;
use crate::core::errors::RegistryError;
use std::collections::HashMap;

pub struct AssistantRegistry {
    assistants: Vec<AssistantConfig>,
    index: HashMap<String, usize>,
}

impl AssistantRegistry {
    pub fn new(assistants: Vec<AssistantConfig>) -> Self {
        let index = assistants
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();
        Self { assistants, index }
    }

    pub fn get(&self, assistant_id: &str) -> Result<&AssistantConfig, RegistryError> {
        self.index
            .get(assistant_id)
            .map(|&i| &self.assistants[i])
            .ok_or_else(|| RegistryError::NotFound(assistant_id.to_string()))
    }

    pub fn list(&self) -> &[AssistantConfig] {
        &self.assistants
    }

    pub fn len(&self) -> usize {
        self.assistants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assistants.is_empty()
    }
}
