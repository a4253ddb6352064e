//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted to use case inputs where
//! the binary wires things together.

mod chat;
mod logging;
mod providers;
mod repl;
mod storage;

pub use chat::FileChatConfig;
pub use logging::FileLoggingConfig;
pub use providers::{FileOpenAiConfig, FileProvidersConfig};
pub use repl::FileReplConfig;
pub use storage::{FileStorageBackend, FileStorageConfig};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    #[error("chat.model cannot be empty")]
    EmptyModelName,

    #[error("chat.model_max_tokens must be greater than 0")]
    InvalidModelMaxTokens,

    #[error("chat.{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("chat.n must be at least 1")]
    InvalidChoiceCount,

    #[error("providers.openai.stream_buffer must be greater than 0")]
    InvalidStreamBuffer,

    #[error("providers.openai.request_timeout_secs cannot be 0")]
    InvalidTimeout,

    #[error("providers.openai.base_url cannot be empty")]
    EmptyBaseUrl,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Defaults for newly created chats
    pub chat: FileChatConfig,
    /// Provider settings
    pub providers: FileProvidersConfig,
    /// Chat persistence
    pub storage: FileStorageConfig,
    /// Log destinations
    pub logging: FileLoggingConfig,
    /// REPL settings
    pub repl: FileReplConfig,
}

impl FileConfig {
    /// Validate the configuration, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let chat = &self.chat;
        if chat.model.trim().is_empty() {
            return Err(ConfigValidationError::EmptyModelName);
        }
        if chat.model_max_tokens == 0 {
            return Err(ConfigValidationError::InvalidModelMaxTokens);
        }
        check_range("temperature", chat.temperature, 0.0, 2.0)?;
        check_range("top_p", chat.top_p, 0.0, 1.0)?;
        check_range("presence_penalty", chat.presence_penalty, -2.0, 2.0)?;
        check_range("frequency_penalty", chat.frequency_penalty, -2.0, 2.0)?;
        if chat.n == 0 {
            return Err(ConfigValidationError::InvalidChoiceCount);
        }

        let openai = &self.providers.openai;
        if openai.stream_buffer == 0 {
            return Err(ConfigValidationError::InvalidStreamBuffer);
        }
        if openai.request_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        if openai.base_url.trim().is_empty() {
            return Err(ConfigValidationError::EmptyBaseUrl);
        }

        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: f32,
    min: f32,
    max: f32,
) -> Result<(), ConfigValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
