//! Generation parameters bound to a chat

use crate::core::error::DomainError;
use crate::core::model::Model;
use serde::{Deserialize, Serialize};

/// Generation parameters for a conversation (Value Object)
///
/// Fixed when the chat is created; every turn of the chat is requested
/// with the same parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub model: Model,
    pub temperature: f32,
    pub top_p: f32,
    /// Number of completions to sample
    pub n: u32,
    pub stop: Vec<String>,
    /// Cap on generated tokens per reply (0 leaves it to the provider)
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// Text of the system message that opens the chat
    pub initial_system_message: String,
}

impl ChatConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.model.as_str().trim().is_empty() {
            return Err(DomainError::validation("model name is empty"));
        }
        if self.model.max_tokens() == 0 {
            return Err(DomainError::validation("model max tokens must be positive"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(DomainError::validation(format!(
                "temperature {} out of range [0, 2]",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(DomainError::validation(format!(
                "top_p {} out of range [0, 1]",
                self.top_p
            )));
        }
        if self.n == 0 {
            return Err(DomainError::validation("n must be at least 1"));
        }
        for (name, value) in [
            ("presence_penalty", self.presence_penalty),
            ("frequency_penalty", self.frequency_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                return Err(DomainError::validation(format!(
                    "{name} {value} out of range [-2, 2]"
                )));
            }
        }
        Ok(())
    }
}
