//! In-memory chat store

use async_trait::async_trait;
use chatstream_application::ports::chat_store::{ChatStore, ChatStoreError};
use chatstream_domain::Chat;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Keeps chats in process memory. Contents are lost on exit.
#[derive(Default)]
pub struct InMemoryChatStore {
    chats: RwLock<HashMap<String, Chat>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.chats.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chats.read().await.is_empty()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn find_chat_by_id(&self, id: &str) -> Result<Chat, ChatStoreError> {
        self.chats
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ChatStoreError::NotFound(id.to_string()))
    }

    async fn create_chat(&self, chat: &Chat) -> Result<(), ChatStoreError> {
        let mut chats = self.chats.write().await;
        if chats.contains_key(chat.id()) {
            return Err(ChatStoreError::AlreadyExists(chat.id().to_string()));
        }
        chats.insert(chat.id().to_string(), chat.clone());
        Ok(())
    }

    async fn save_chat(&self, chat: &Chat) -> Result<(), ChatStoreError> {
        self.chats
            .write()
            .await
            .insert(chat.id().to_string(), chat.clone());
        Ok(())
    }
}
