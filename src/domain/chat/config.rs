use serde::{Deserialize, Serialize};

use super::DEFAULT_SYSTEM_PROMPT;
use crate::domain::llm::ProviderKind;

/// Generation settings for the chat assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Longest accepted prompt, in characters
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Used when a request does not name a provider
    #[serde(default)]
    pub default_provider: ProviderKind,

    /// Characters of post content sent for summarization
    #[serde(default = "default_summary_input_chars")]
    pub summary_input_chars: usize,

    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_max_prompt_chars() -> usize {
    5000
}

fn default_max_output_tokens() -> u32 {
    300
}

fn default_temperature() -> f32 {
    0.7
}

fn default_summary_input_chars() -> usize {
    5000
}

fn default_summary_max_tokens() -> u32 {
    500
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_prompt_chars: default_max_prompt_chars(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            default_provider: ProviderKind::default(),
            summary_input_chars: default_summary_input_chars(),
            summary_max_tokens: default_summary_max_tokens(),
        }
    }
}

impl AssistantConfig {
    pub fn with_max_prompt_chars(mut self, chars: usize) -> Self {
        self.max_prompt_chars = chars;
        self
    }

    pub fn with_default_provider(mut self, provider: ProviderKind) -> Self {
        self.default_provider = provider;
        self
    }
}
