//! Chat store port
//!
//! Defines the persistence contract for [`Chat`] aggregates.

use async_trait::async_trait;
use chatstream_domain::Chat;
use thiserror::Error;

/// Errors that can occur during chat store operations
#[derive(Error, Debug)]
pub enum ChatStoreError {
    #[error("Chat not found: {0}")]
    NotFound(String),

    #[error("Chat already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid chat id: {0}")]
    InvalidId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl ChatStoreError {
    /// Check if this error means no chat is stored under the id
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChatStoreError::NotFound(_))
    }
}

/// Durable storage for chats
///
/// Owns a chat's lifetime between turns. Implementations must be safe for
/// concurrent use across independent chats.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Load a chat, failing with [`ChatStoreError::NotFound`] when absent
    async fn find_chat_by_id(&self, id: &str) -> Result<Chat, ChatStoreError>;

    /// Persist a chat for the first time
    async fn create_chat(&self, chat: &Chat) -> Result<(), ChatStoreError>;

    /// Persist the full state of a chat, replacing what was stored
    async fn save_chat(&self, chat: &Chat) -> Result<(), ChatStoreError>;
}
