//! File-backed chat store
//!
//! One pretty-printed JSON document per chat, named `<chat id>.json`.
//! Writes go through a temp file in the same directory followed by a
//! rename, so readers never see a half-written chat.

use async_trait::async_trait;
use chatstream_application::ports::chat_store::{ChatStore, ChatStoreError};
use chatstream_domain::Chat;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub struct FileChatStore {
    base_path: PathBuf,
}

impl FileChatStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn chat_path(&self, chat_id: &str) -> Result<PathBuf, ChatStoreError> {
        validate_chat_id(chat_id)?;
        Ok(self.base_path.join(format!("{}.json", chat_id)))
    }

    async fn write_chat(&self, chat: &Chat, path: &Path) -> Result<(), ChatStoreError> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        let content = serde_json::to_vec_pretty(chat)?;

        let tmp_path = self.base_path.join(format!(
            ".{}.{}.tmp",
            chat.id(),
            uuid::Uuid::new_v4().simple()
        ));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&content).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, path).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(ChatStoreError::Io(e));
        }
        debug!(chat_id = %chat.id(), path = %path.display(), "Wrote chat");
        Ok(())
    }
}

/// Reject ids that are unsafe as a file name.
fn validate_chat_id(chat_id: &str) -> Result<(), ChatStoreError> {
    if chat_id.is_empty() {
        return Err(ChatStoreError::InvalidId(
            "chat id cannot be empty".to_string(),
        ));
    }
    if chat_id.contains(['/', '\\', '\0']) || chat_id.contains("..") || chat_id.starts_with('.') {
        return Err(ChatStoreError::InvalidId(format!(
            "chat id contains invalid characters: {chat_id:?}"
        )));
    }
    if chat_id.chars().any(char::is_control) {
        return Err(ChatStoreError::InvalidId(format!(
            "chat id contains control characters: {chat_id:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl ChatStore for FileChatStore {
    async fn find_chat_by_id(&self, id: &str) -> Result<Chat, ChatStoreError> {
        let path = self.chat_path(id)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChatStoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(ChatStoreError::Io(e)),
        };
        Ok(serde_json::from_slice(&content)?)
    }

    async fn create_chat(&self, chat: &Chat) -> Result<(), ChatStoreError> {
        let path = self.chat_path(chat.id())?;
        if tokio::fs::try_exists(&path).await? {
            return Err(ChatStoreError::AlreadyExists(chat.id().to_string()));
        }
        self.write_chat(chat, &path).await
    }

    async fn save_chat(&self, chat: &Chat) -> Result<(), ChatStoreError> {
        let path = self.chat_path(chat.id())?;
        self.write_chat(chat, &path).await
    }
}
