//! Infrastructure layer for chatstream
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod logging;
pub mod openai;
pub mod storage;
pub mod tokenizer;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileChatConfig, FileConfig, FileLoggingConfig,
    FileOpenAiConfig, FileReplConfig, FileStorageBackend, FileStorageConfig,
};
pub use logging::JsonlConversationLogger;
pub use openai::{OpenAiCompletionProvider, OpenAiSetupError};
pub use storage::{FileChatStore, InMemoryChatStore};
pub use tokenizer::TiktokenTokenizer;
