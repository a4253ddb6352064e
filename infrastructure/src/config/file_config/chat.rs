//! Chat defaults from TOML (`[chat]` section)
//!
//! Applied only when a turn creates a new chat; an existing chat keeps the
//! config it was created with.

use chatstream_application::ChatCompletionConfigInput;
use serde::{Deserialize, Serialize};

/// Raw chat configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChatConfig {
    /// Model name sent to the provider
    pub model: String,
    /// Context window of the model, in tokens
    pub model_max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    /// Number of completions requested
    pub n: u32,
    /// Stop sequences
    pub stop: Vec<String>,
    /// Max output tokens per reply (0 = provider default)
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// System message that opens every new chat
    pub initial_system_message: String,
}

impl Default for FileChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            model_max_tokens: 4096,
            temperature: 0.1,
            top_p: 1.0,
            n: 1,
            stop: Vec::new(),
            max_tokens: 300,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            initial_system_message: "You are a helpful assistant.".to_string(),
        }
    }
}

impl FileChatConfig {
    /// Convert to the use case's chat creation input.
    pub fn to_config_input(&self) -> ChatCompletionConfigInput {
        ChatCompletionConfigInput {
            model: self.model.clone(),
            model_max_tokens: self.model_max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            n: self.n,
            stop: self.stop.clone(),
            max_tokens: self.max_tokens,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
            initial_system_message: self.initial_system_message.clone(),
        }
    }
}
